use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Row;

/// A stored user. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    /// Build a user from a result row. `password` and `created_at` are
    /// optional columns.
    pub fn from_row(row: &Row) -> Option<Self> {
        let text = |key: &str| row.get(key).and_then(Value::as_str).map(str::to_string);

        Some(Self {
            id: row.get("id").and_then(Value::as_i64)?,
            username: text("username")?,
            email: text("email")?,
            password_hash: text("password"),
            created_at: text("created_at"),
        })
    }
}

/// Registration input. All fields are required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(
                "Missing required fields: username, email, and password are required".to_string(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_row_and_serialize_hides_password() {
        let row = json!({
            "id": 7,
            "username": "ada",
            "email": "ada@example.com",
            "password": "$argon2id$...",
            "created_at": "2024-01-01 10:00:00",
        });
        let user = User::from_row(row.as_object().unwrap()).unwrap();
        assert_eq!(user.id, 7);
        assert!(user.password_hash.is_some());

        let out = serde_json::to_value(&user).unwrap();
        assert!(out.get("password").is_none());
        assert!(out.get("password_hash").is_none());
        assert_eq!(out["created_at"], "2024-01-01 10:00:00");
    }

    #[test]
    fn test_from_row_requires_identity_columns() {
        let row = json!({ "id": 1, "username": "x" });
        assert!(User::from_row(row.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_validate_requires_all_fields() {
        let mut input = NewUser {
            username: "ada".into(),
            email: "ada@example.com".into(),
            password: "pw".into(),
        };
        assert!(input.validate().is_ok());

        input.email = "  ".into();
        assert!(input.validate().is_err());
    }
}
