//! Integration tests for the Runtime API, the Invoke API and the inspection endpoints.

mod common;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use common::TestEmulator;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

const NEXT: &str = "/2018-06-01/runtime/invocation/next";
const INVOKE: &str = "/2015-03-31/functions/function/invocations";

async fn next(client: &Client, emulator: &TestEmulator, path: &str) -> Response {
    timeout(Duration::from_secs(5), client.get(emulator.url(path)).send())
        .await
        .expect("no invocation within 5s")
        .unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn test_invoke_next_and_response() {
    let emulator = TestEmulator::start().await;
    let client = Client::new();

    let invoke = tokio::spawn({
        let client = client.clone();
        let url = emulator.url(INVOKE);
        async move {
            client
                .post(url)
                .header("X-Amzn-Trace-Id", "Root=1-5759e988-bd862e3fe1be46a994272793")
                .header("X-Amz-Client-Context", BASE64.encode(r#"{"custom":{"k":"v"}}"#))
                .body(r#"{"command":"hi"}"#)
                .send()
                .await
                .unwrap()
        }
    });

    let next = next(&client, &emulator, NEXT).await;
    assert_eq!(next.status(), 200);
    let request_id = header(&next, "lambda-runtime-aws-request-id").to_owned();
    assert_eq!(
        header(&next, "lambda-runtime-trace-id"),
        "Root=1-5759e988-bd862e3fe1be46a994272793"
    );
    assert_eq!(
        header(&next, "lambda-runtime-invoked-function-arn"),
        "arn:aws:lambda:us-east-1:123456789012:function:function"
    );
    assert_eq!(header(&next, "lambda-runtime-client-context"), r#"{"custom":{"k":"v"}}"#);
    assert!(header(&next, "lambda-runtime-deadline-ms").parse::<i64>().is_ok());
    assert_eq!(next.text().await.unwrap(), r#"{"command":"hi"}"#);

    let posted = client
        .post(emulator.url(&format!("/2018-06-01/runtime/invocation/{request_id}/response")))
        .body(r#"{"msg":"hello"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(posted.status(), 202);
    assert_eq!(posted.json::<Value>().await.unwrap(), json!({"status": "OK"}));

    let invoked = invoke.await.unwrap();
    assert_eq!(invoked.status(), 200);
    assert!(invoked.headers().get("x-amz-function-error").is_none());
    assert_eq!(invoked.text().await.unwrap(), r#"{"msg":"hello"}"#);
}

#[tokio::test]
async fn test_function_error_is_reported_to_the_caller() {
    let emulator = TestEmulator::start().await;
    let client = Client::new();

    let invoke = tokio::spawn(client.post(emulator.url(INVOKE)).body("{}").send());

    let next = next(&client, &emulator, NEXT).await;
    let request_id = header(&next, "lambda-runtime-aws-request-id").to_owned();

    let posted = client
        .post(emulator.url(&format!("/2018-06-01/runtime/invocation/{request_id}/error")))
        .header("Lambda-Runtime-Function-Error-Type", "Runtime.Handled")
        .body(r#"{"errorType":"MyError","errorMessage":"boom"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(posted.status(), 202);

    let invoked = invoke.await.unwrap().unwrap();
    assert_eq!(invoked.status(), 200);
    assert_eq!(header(&invoked, "x-amz-function-error"), "Unhandled");
    let error: Value = invoked.json().await.unwrap();
    assert_eq!(error["errorType"], "MyError");
    assert_eq!(error["errorMessage"], "boom");
}

#[tokio::test]
async fn test_protocol_errors() {
    let emulator = TestEmulator::start().await;
    let client = Client::new();

    let unknown = client
        .post(emulator.url("/2018-06-01/runtime/invocation/no-such-id/response"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 400);
    assert_eq!(unknown.json::<Value>().await.unwrap()["errorType"], "InvalidRequestID");

    let invoke = tokio::spawn(client.post(emulator.url(INVOKE)).body("{}").send());
    let next = next(&client, &emulator, NEXT).await;
    let response_url = emulator.url(&format!(
        "/2018-06-01/runtime/invocation/{}/response",
        header(&next, "lambda-runtime-aws-request-id")
    ));

    assert_eq!(client.post(&response_url).body("1").send().await.unwrap().status(), 202);
    invoke.await.unwrap().unwrap();

    // the first result wins
    let again = client.post(&response_url).body("2").send().await.unwrap();
    assert_eq!(again.status(), 403);
    assert_eq!(again.json::<Value>().await.unwrap()["errorType"], "InvalidStateTransition");

    let missing = client.get(emulator.url("/2018-06-01/runtime/nothing")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_init_error_is_sticky() {
    let emulator = TestEmulator::start().await;
    let client = Client::new();

    let posted = client
        .post(emulator.url("/2018-06-01/runtime/init/error"))
        .body(r#"{"errorType":"Runtime.ImportError","errorMessage":"no handler"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(posted.status(), 202);

    let next = next(&client, &emulator, NEXT).await;
    assert_eq!(next.status(), 500);
    assert_eq!(next.json::<Value>().await.unwrap()["errorType"], "Runtime.ImportError");

    let invoked = client.post(emulator.url(INVOKE)).body("{}").send().await.unwrap();
    assert_eq!(invoked.status(), 502);
    assert_eq!(invoked.json::<Value>().await.unwrap()["errorMessage"], "no handler");
}

#[tokio::test]
async fn test_event_and_dry_run_invocations() {
    let emulator = TestEmulator::start().await;
    let client = Client::new();

    let dry_run = client
        .post(emulator.url(INVOKE))
        .header("X-Amz-Invocation-Type", "DryRun")
        .send()
        .await
        .unwrap();
    assert_eq!(dry_run.status(), 204);

    for i in 0..2 {
        let event = client
            .post(emulator.url(INVOKE))
            .header("X-Amz-Invocation-Type", "Event")
            .body(format!(r#"{{"n":{i}}}"#))
            .send()
            .await
            .unwrap();
        assert_eq!(event.status(), 202);
    }

    let snapshot: Value = client
        .get(emulator.url("/_emulator/functions/function"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let pending = snapshot["pending"].as_array().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0]["input"], r#"{"n":0}"#);

    // FIFO
    let first = next(&client, &emulator, NEXT).await;
    assert_eq!(first.text().await.unwrap(), r#"{"n":0}"#);

    let invalid = client
        .post(emulator.url(INVOKE))
        .header("X-Amz-Invocation-Type", "Sometimes")
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 400);
}

#[tokio::test]
async fn test_functions_are_separated_by_prefix() {
    let emulator = TestEmulator::start().await;
    let client = Client::new();

    let invoke = tokio::spawn(
        client
            .post(emulator.url(
                "/2015-03-31/functions/arn:aws:lambda:us-east-1:123456789012:function:orders/invocations",
            ))
            .body(r#""order""#)
            .send(),
    );

    let next = next(&client, &emulator, "/orders/2018-06-01/runtime/invocation/next").await;
    assert_eq!(
        header(&next, "lambda-runtime-invoked-function-arn"),
        "arn:aws:lambda:us-east-1:123456789012:function:orders"
    );
    let request_id = header(&next, "lambda-runtime-aws-request-id").to_owned();

    // the default function knows nothing about it
    let wrong_store = client
        .post(emulator.url(&format!("/2018-06-01/runtime/invocation/{request_id}/response")))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_store.status(), 400);

    let posted = client
        .post(emulator.url(&format!("/orders/2018-06-01/runtime/invocation/{request_id}/response")))
        .body(r#""done""#)
        .send()
        .await
        .unwrap();
    assert_eq!(posted.status(), 202);
    assert_eq!(invoke.await.unwrap().unwrap().text().await.unwrap(), r#""done""#);

    let functions: Value = client
        .get(emulator.url("/_emulator/functions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(functions, json!(["function", "orders"]));
}

#[tokio::test]
async fn test_inspection_clear_and_requeue() {
    let emulator = TestEmulator::start().await;
    let client = Client::new();

    let invoke = tokio::spawn(client.post(emulator.url(INVOKE)).body(r#"{"n":1}"#).send());
    let first = next(&client, &emulator, NEXT).await;
    let request_id = header(&first, "lambda-runtime-aws-request-id").to_owned();
    client
        .post(emulator.url(&format!("/2018-06-01/runtime/invocation/{request_id}/response")))
        .body("1")
        .send()
        .await
        .unwrap();
    invoke.await.unwrap().unwrap();

    let requeued = client
        .post(emulator.url(&format!("/_emulator/functions/function/requeue/{request_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(requeued.status(), 202);
    let new_id = requeued.json::<Value>().await.unwrap()["id"].as_str().unwrap().to_owned();
    assert_ne!(new_id, request_id);

    let cleared: Value = client
        .delete(emulator.url("/_emulator/functions/function/queued"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["cleared"], 1);

    let cleared: Value = client
        .delete(emulator.url("/_emulator/functions/function/executed"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["cleared"], 1);

    let snapshot: Value = client
        .get(emulator.url("/_emulator/functions/function"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["pending"], json!([]));
    assert_eq!(snapshot["history"], json!([]));

    let unknown = client
        .get(emulator.url("/_emulator/functions/nobody"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn test_shutdown_releases_waiting_runtime() {
    let emulator = TestEmulator::start().await;
    let client = Client::new();

    let waiting = tokio::spawn(client.get(emulator.url(NEXT)).send());
    tokio::time::sleep(Duration::from_millis(100)).await;
    emulator.cancel.cancel();

    let released = timeout(Duration::from_secs(5), waiting).await.unwrap().unwrap().unwrap();
    assert_eq!(released.status(), 503);
    assert!(emulator.registry.get_or_create("function").pending_ids().is_empty());
}
