//! Integration tests for encode/decode round trips of responses.
//!
//! A response written by one peer must be read back by the other with the
//! same id and the same result or error.

use flow_plugin_rpc::{
    ErrorObject, FrameReader, FrameWriter, INTERNAL_ERROR, Message, RequestId, Response,
    ResponsePayload,
};
use rstest::rstest;
use serde_json::{Value, json};
use std::io::Cursor;

async fn roundtrip(message: &Message) -> Message {
    let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
    writer.send(message).await.unwrap();

    let bytes = writer.into_inner().into_inner().into_inner();
    let mut reader = FrameReader::new(Cursor::new(bytes));
    reader.read_message().await.unwrap().unwrap()
}

#[rstest]
#[case::null_result(Response::result(RequestId::Number(0), Value::Null))]
#[case::object_result(Response::result(RequestId::Number(7), json!({"result": [{"title": "hi"}]})))]
#[case::string_id(Response::result(RequestId::from("abc"), json!([1, 2, 3])))]
#[case::internal_error(Response::internal_error(RequestId::Number(3), "handler failed"))]
#[case::custom_error(Response::error(RequestId::Number(9), -32000, "Überlastet"))]
#[tokio::test]
async fn response_roundtrip(#[case] original: Response) {
    let decoded = roundtrip(&Message::from(original.clone())).await;
    assert_eq!(decoded, Message::Response(original));
}

#[tokio::test]
async fn error_data_survives_roundtrip() {
    let original = Response {
        id: RequestId::Number(1),
        payload: ResponsePayload::Error(ErrorObject {
            code: INTERNAL_ERROR,
            message: "boom".to_string(),
            data: Some(json!({"handler": "greet"})),
        }),
    };

    let Message::Response(decoded) = roundtrip(&Message::from(original.clone())).await else {
        panic!("expected a response");
    };
    assert_eq!(decoded.id, original.id);
    assert_eq!(decoded.into_result().unwrap_err().data, Some(json!({"handler": "greet"})));
}
