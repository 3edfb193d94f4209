//! Student record endpoints

use axum::{
    extract::State,
    Json,
};

use crate::{error::AppResult, models::user::User};

use super::{AppPath, AuthenticatedUser};

/// List all students
#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Students ordered by name", body = Vec<User>),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn list_students(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<User>>> {
    claims.require_librarian()?;

    let students = state.services.auth.list_students().await?;
    Ok(Json(students))
}

/// Get a student record
#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student user ID")),
    responses(
        (status = 200, description = "Student record", body = User),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn get_student(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i32>,
) -> AppResult<Json<User>> {
    claims.require_self_or_librarian(id)?;

    let student = state.services.auth.get_student(id).await?;
    Ok(Json(student))
}
