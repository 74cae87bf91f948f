use serde::Serialize;

/// The `{code, message}` acknowledgment used by delete and admin endpoints.
#[derive(Debug, Serialize)]
pub struct MessageReply {
    pub code: i32,
    pub message: String,
}

impl MessageReply {
    pub fn deleted(n: usize) -> MessageReply {
        let noun = if n == 1 { "entry" } else { "entries" };
        MessageReply { code: 0, message: format!("deleted {} {}", n, noun) }
    }

    pub fn ok(message: impl Into<String>) -> MessageReply {
        MessageReply { code: 0, message: message.into() }
    }
}

/// `[{ "URI": ... }]` creation responses.
#[derive(Debug, Serialize)]
pub struct ResourceUri {
    #[serde(rename = "URI")]
    pub uri: String,
}
