//! Loan model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::user::StudentSummary;

/// Loan model from database. Active while `return_date` is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: i32,
    /// Borrowing user's database id
    pub student_id: i32,
    pub bid: i32,
    /// Book title at issue time; not updated if the book is renamed later
    pub title: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.return_date.is_none()
    }
}

/// Loan with the borrower and fine details for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub student: Option<StudentSummary>,
    /// Whole days past the due date, as of the return date or now
    pub overdue_days: i64,
    pub fine: i64,
}

/// Loan joined with its borrower, as read by the active-loan queries
#[derive(Debug, Clone, FromRow)]
pub struct LoanStudentRow {
    pub id: i32,
    pub student_id: i32,
    pub bid: i32,
    pub title: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub student_name: String,
    pub student_email: String,
    pub student_number: Option<String>,
}

impl LoanStudentRow {
    pub fn into_parts(self) -> (Loan, StudentSummary) {
        let student = StudentSummary {
            id: self.student_id,
            name: self.student_name,
            email: self.student_email,
            student_id: self.student_number,
        };
        let loan = Loan {
            id: self.id,
            student_id: self.student_id,
            bid: self.bid,
            title: self.title,
            issue_date: self.issue_date,
            due_date: self.due_date,
            return_date: self.return_date,
        };
        (loan, student)
    }
}

/// Issue request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueLoan {
    pub student_id: i32,
    pub bid: i32,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    #[serde(deserialize_with = "flexible_date::deserialize")]
    #[schema(value_type = String)]
    pub due_date: DateTime<Utc>,
}

/// Return request, the body is optional
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLoan {
    /// Defaults to now
    #[serde(default, deserialize_with = "flexible_date::deserialize_option")]
    #[schema(value_type = Option<String>)]
    pub return_date: Option<DateTime<Utc>>,
}

/// Row to insert when issuing a book
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub student_id: i32,
    pub bid: i32,
    pub title: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Loan history filter
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub student_id: Option<i32>,
}

/// Dates sent by clients: full RFC 3339 timestamps or plain calendar dates
pub mod flexible_date {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn parse(value: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt.with_timezone(&Utc));
        }
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date: {}", value))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("Invalid date: {}", value))?;
        Ok(Utc.from_utc_datetime(&midnight))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse(&value).map_err(de::Error::custom)
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) => parse(&value).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_issue_accepts_calendar_date() {
        let request: IssueLoan =
            serde_json::from_str(r#"{"studentId": 3, "bid": 16, "dueDate": "2024-01-15"}"#).unwrap();
        assert_eq!(request.due_date, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_issue_accepts_rfc3339_with_offset() {
        let request: IssueLoan = serde_json::from_str(
            r#"{"studentId": 3, "bid": 16, "dueDate": "2024-01-15T10:00:00+02:00"}"#,
        )
        .unwrap();
        assert_eq!(request.due_date, Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_issue_rejects_garbage_date() {
        let result: Result<IssueLoan, _> =
            serde_json::from_str(r#"{"studentId": 3, "bid": 16, "dueDate": "next week"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_return_body_optional_date() {
        let empty: ReturnLoan = serde_json::from_str("{}").unwrap();
        assert!(empty.return_date.is_none());

        let null: ReturnLoan = serde_json::from_str(r#"{"returnDate": null}"#).unwrap();
        assert!(null.return_date.is_none());

        let dated: ReturnLoan = serde_json::from_str(r#"{"returnDate": "2024-01-06"}"#).unwrap();
        assert_eq!(dated.return_date, Some(Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_details_flatten_loan_fields() {
        let loan = Loan {
            id: 1,
            student_id: 3,
            bid: 16,
            title: "Dune".to_string(),
            issue_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            due_date: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            return_date: None,
        };
        let details = LoanDetails { loan, student: None, overdue_days: 0, fine: 0 };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["bid"], 16);
        assert_eq!(json["studentId"], 3);
        assert!(json["returnDate"].is_null());
        assert_eq!(json["fine"], 0);
    }
}
