use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum QuizgateError {
    #[error("Database error: {0}")]
    #[diagnostic(code(quizgate::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Invalid subject header `{0}`")]
    #[diagnostic(
        code(quizgate::config::subject_header),
        help("`authz.subject_header` must be a valid HTTP header name, e.g. x-user-id")
    )]
    InvalidSubjectHeader(String),
}
