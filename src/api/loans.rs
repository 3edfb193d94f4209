//! Loan management endpoints

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::loan::{IssueLoan, Loan, LoanDetails, LoanQuery, ReturnLoan},
};

use super::{AppJson, AppPath, AppQuery, AuthenticatedUser};

#[derive(Serialize, ToSchema)]
pub struct IssueResponse {
    pub loan: Loan,
}

#[derive(Serialize, ToSchema)]
pub struct LoansResponse {
    pub loans: Vec<LoanDetails>,
}

/// Closed loan with the fine owed
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub record: LoanDetails,
}

/// Issue a book to a student
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = IssueLoan,
    responses(
        (status = 201, description = "Loan created", body = IssueResponse),
        (status = 400, description = "Invalid request or user is not a student"),
        (status = 404, description = "Student or book not found"),
        (status = 409, description = "Book already on loan")
    )
)]
pub async fn issue_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<IssueLoan>,
) -> AppResult<(StatusCode, Json<IssueResponse>)> {
    claims.require_librarian()?;

    let loan = state.services.loans.issue(request).await?;
    Ok((StatusCode::CREATED, Json(IssueResponse { loan })))
}

/// Return a borrowed book
#[utoipa::path(
    put,
    path = "/loans/return/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body(content = ReturnLoan, description = "Optional body, return date defaults to now"),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(loan_id): AppPath<i32>,
    body: Bytes,
) -> AppResult<Json<ReturnResponse>> {
    claims.require_librarian()?;

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ReturnLoan::default()
    } else {
        serde_json::from_slice::<ReturnLoan>(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?
    };

    let record = state
        .services
        .loans
        .return_loan(loan_id, request.return_date)
        .await?;
    Ok(Json(ReturnResponse { record }))
}

/// List active loans with their borrowers
#[utoipa::path(
    get,
    path = "/loans/active",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans", body = LoansResponse),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn list_active_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LoansResponse>> {
    claims.require_librarian()?;

    let loans = state.services.loans.list_active().await?;
    Ok(Json(LoansResponse { loans }))
}

/// List active loans past their due date
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans with fines", body = LoansResponse),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn list_overdue_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LoansResponse>> {
    claims.require_librarian()?;

    let loans = state.services.loans.list_overdue().await?;
    Ok(Json(LoansResponse { loans }))
}

/// Loan history. Students only see their own.
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans, newest first", body = Vec<LoanDetails>),
        (status = 403, description = "Another student's loans"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppQuery(query): AppQuery<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let student_id = match query.student_id {
        Some(id) => {
            claims.require_self_or_librarian(id)?;
            Some(id)
        }
        None if claims.is_librarian() => None,
        None => Some(claims.user_id),
    };

    let loans = state.services.loans.list(student_id).await?;
    Ok(Json(loans))
}

/// Get a single loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 403, description = "Another student's loan"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(loan_id): AppPath<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get(loan_id).await?;
    claims.require_self_or_librarian(loan.loan.student_id)?;
    Ok(Json(loan))
}
