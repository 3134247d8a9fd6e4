use serde::Serialize;

/// Uniform response envelope: `{ "success": true, "message": ..., "data": ... }`.
/// `data` is omitted entirely for message-only responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_with_data() {
        let body = ApiResponse::ok("Items", json!({"count": 2}));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "message": "Items", "data": {"count": 2}})
        );
    }

    #[test]
    fn message_only_envelope_omits_data() {
        let body = ApiResponse::<()>::message("Logout successfully");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "message": "Logout successfully"})
        );
    }
}
