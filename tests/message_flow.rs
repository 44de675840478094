mod common;

use std::sync::Arc;
use std::time::Duration;

use ai_helper::error::Error;
use ai_helper::storage::{CREDENTIAL_KEY, KeyValueStore, TRANSCRIPT_KEY};
use ai_helper::transcript::{Role, Transcript};
use ai_helper::view::Mode;
use ai_helper::widget::{INVALID_KEY_ERROR, MISSING_KEY_ERROR, SubmitOutcome};
use common::{Reply, ScriptedClient, chatting};
use tokio::sync::Notify;

#[tokio::test]
async fn test_round_trip_appends_two_messages() {
    let h = chatting(ScriptedClient::new([Reply::Ok("<b>hi</b>".into())]));
    let before = h.widget.transcript_len();

    h.widget.type_text("hello");
    assert_eq!(h.widget.submit_message().await, SubmitOutcome::Answered);

    let transcript = h.widget.transcript();
    assert_eq!(transcript.len(), before + 2);
    let messages = transcript.messages();
    assert_eq!(messages[before].role, Role::User);
    assert_eq!(messages[before].content, "hello");
    assert_eq!(messages[before + 1].role, Role::Assistant);
    assert_eq!(messages[before + 1].content, "<b>hi</b>");

    assert_eq!(h.client.requests(), vec![("hello".to_string(), "sk-test".to_string())]);
    assert_eq!(h.widget.view().lock().input(), "");

    // Persisted blob matches the in-memory model.
    assert_eq!(Transcript::load(h.store.as_ref()), transcript);
}

#[tokio::test]
async fn test_input_is_trimmed_and_escaped() {
    let h = chatting(ScriptedClient::new([Reply::Ok("ok".into())]));

    h.widget.type_text("  <i>two</i>\nlines  ");
    h.widget.submit_message().await;

    assert_eq!(h.client.requests()[0].0, "<i>two</i>\nlines");
    assert_eq!(
        h.widget.transcript().messages()[0].content,
        "&lt;i&gt;two&lt;/i&gt;<br>lines"
    );
}

#[tokio::test]
async fn test_blank_input_is_noop() {
    let h = chatting(ScriptedClient::new([]));
    let writes = h.store.write_count();

    for input in ["", "   ", "\n\t "] {
        h.widget.type_text(input);
        assert_eq!(h.widget.submit_message().await, SubmitOutcome::Empty);
    }

    assert_eq!(h.widget.transcript_len(), 0);
    assert_eq!(h.client.calls(), 0);
    assert_eq!(h.store.write_count(), writes);
}

#[tokio::test]
async fn test_missing_credential_skips_network() {
    let h = chatting(ScriptedClient::new([Reply::Ok("never".into())]));
    // Key removed behind the widget's back, e.g. by another tab.
    h.store.remove(CREDENTIAL_KEY).unwrap();

    h.widget.type_text("hello");
    assert_eq!(
        h.widget.submit_message().await,
        SubmitOutcome::MissingCredential
    );

    assert_eq!(h.client.calls(), 0);
    assert_eq!(h.widget.mode(), Mode::KeyEntry);
    let transcript = h.widget.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript.messages()[0].role, Role::Assistant);
    assert!(transcript.messages()[0].content.contains(MISSING_KEY_ERROR));
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_status_clears_key() {
    let h = chatting(ScriptedClient::new([Reply::Err(Error::Status(401))]));

    h.widget.type_text("hello");
    assert_eq!(
        h.widget.submit_message().await,
        SubmitOutcome::Failed {
            credential_rejected: true
        }
    );

    assert!(h.store.get(CREDENTIAL_KEY).is_none());
    let transcript = h.widget.transcript();
    assert_eq!(transcript.len(), 2);
    let error = &transcript.messages()[1].content;
    assert!(error.contains(r#"class="error-message""#));
    assert!(error.contains(INVALID_KEY_ERROR));

    // Still showing the chat until the re-key delay passes.
    assert_eq!(h.widget.mode(), Mode::Chat);
    tokio::time::sleep(Duration::from_millis(1900)).await;
    assert_eq!(h.widget.mode(), Mode::Chat);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.widget.mode(), Mode::KeyEntry);
}

#[tokio::test(start_paused = true)]
async fn test_auth_error_payload_clears_key() {
    let h = chatting(ScriptedClient::new([Reply::Err(Error::Server(
        "No auth credentials found".into(),
    ))]));

    h.widget.type_text("hello");
    h.widget.submit_message().await;

    assert!(!h.widget.has_credential());
    tokio::time::sleep(Duration::from_millis(2050)).await;
    assert_eq!(h.widget.mode(), Mode::KeyEntry);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_keeps_key() {
    let h = chatting(ScriptedClient::new([
        Reply::Err(Error::Status(500)),
        Reply::Err(Error::Server("Model overloaded".into())),
    ]));

    h.widget.type_text("one");
    assert_eq!(
        h.widget.submit_message().await,
        SubmitOutcome::Failed {
            credential_rejected: false
        }
    );
    h.widget.type_text("two");
    h.widget.submit_message().await;

    assert!(h.widget.has_credential());
    let transcript = h.widget.transcript();
    assert_eq!(transcript.len(), 4);
    assert!(transcript.messages()[1].content.contains("HTTP error! status: 500"));
    assert!(transcript.messages()[3].content.contains("Model overloaded"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.widget.mode(), Mode::Chat);
    // No automatic retry.
    assert_eq!(h.client.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_busy_only_while_in_flight() {
    let gate = Arc::new(Notify::new());
    let h = chatting(ScriptedClient::gated(
        [Reply::Ok("done".into())],
        Arc::clone(&gate),
    ));
    let view = h.widget.view();
    assert!(!view.lock().is_busy());

    h.widget.type_text("slow question");
    let widget = h.widget.clone();
    let pending = tokio::spawn(async move { widget.submit_message().await });

    tokio::task::yield_now().await;
    assert!(view.lock().is_busy());
    assert_eq!(h.widget.transcript_len(), 1);

    // A second submission while busy is refused.
    h.widget.type_text("impatient");
    assert_eq!(h.widget.submit_message().await, SubmitOutcome::Ignored);
    assert_eq!(h.client.calls(), 1);

    // Dots keep cycling while waiting.
    tokio::time::sleep(Duration::from_millis(1250)).await;
    assert_eq!(view.lock().dots(), 2);

    gate.notify_one();
    assert_eq!(pending.await.unwrap(), SubmitOutcome::Answered);
    assert!(!view.lock().is_busy());
    assert_eq!(view.lock().dots(), 0);
    assert_eq!(h.widget.transcript_len(), 2);
}

#[tokio::test]
async fn test_busy_cleared_after_client_panic() {
    let h = chatting(ScriptedClient::new([Reply::Panic, Reply::Ok("back".into())]));

    h.widget.type_text("boom");
    let widget = h.widget.clone();
    let result = tokio::spawn(async move { widget.submit_message().await }).await;
    assert!(result.unwrap_err().is_panic());

    assert!(!h.widget.view().lock().is_busy());

    // The widget accepts the next submission.
    h.widget.type_text("again");
    assert_eq!(h.widget.submit_message().await, SubmitOutcome::Answered);
}

#[tokio::test]
async fn test_submission_ignored_outside_chat() {
    let h = common::harness(ScriptedClient::new([]));
    h.widget.init();

    h.widget.type_text("hello");
    assert_eq!(h.widget.submit_message().await, SubmitOutcome::Ignored);
    assert_eq!(h.widget.transcript_len(), 0);
    assert!(h.store.get(TRANSCRIPT_KEY).is_none());
}
