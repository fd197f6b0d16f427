//! Bulk upload endpoints: CSV upserts into any registered table and
//! spreadsheet imports of practice questions.
//!
//! Failures answer with a flat `{message, ...}` body that admin tooling shows
//! verbatim, so each importer error maps to a fixed message here.

use crate::auth::RequireAdmin;
use crate::import::{
    CsvImporter, ImportError, ImportSummary, TableRegistry, WorkbookImportSummary,
    import_question_workbook,
};
use rocket::form::{Form, FromForm};
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::status;
use rocket::{State, post, serde::json::Json};
use rocket_db_pools::sqlx;
use rocket_okapi::openapi;
use serde::Serialize;
use tokio::io::AsyncReadExt;

/// Multipart body of a CSV upload.
#[derive(Debug, FromForm)]
pub struct CsvUploadForm<'r> {
    pub file: Option<TempFile<'r>>,
    #[field(name = "tableName")]
    pub table_name: Option<String>,
}

/// Multipart body of a spreadsheet question import.
#[derive(Debug, FromForm)]
pub struct WorkbookUploadForm<'r> {
    pub file: Option<TempFile<'r>>,
}

/// Error body for upload failures. Optional fields are omitted when unset.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadErrorResponse {
    fn message(message: &str) -> Self {
        Self {
            message: message.to_string(),
            ..Default::default()
        }
    }
}

type UploadFailure = status::Custom<Json<UploadErrorResponse>>;

fn bad_request(body: UploadErrorResponse) -> UploadFailure {
    status::Custom(Status::BadRequest, Json(body))
}

/// Map a CSV import failure onto its status and body.
pub fn csv_failure(err: &ImportError) -> (Status, UploadErrorResponse) {
    match err {
        ImportError::UnknownTable(_) => (
            Status::BadRequest,
            UploadErrorResponse::message("Invalid table name."),
        ),
        ImportError::Parse(parse_err) => (
            Status::BadRequest,
            UploadErrorResponse {
                error: Some(parse_err.to_string()),
                ..UploadErrorResponse::message("CSV could not be parsed.")
            },
        ),
        ImportError::MissingColumns(columns) => (
            Status::BadRequest,
            UploadErrorResponse {
                missing_columns: Some(columns.clone()),
                ..UploadErrorResponse::message("CSV is missing required columns.")
            },
        ),
        ImportError::RowFailed {
            row_number,
            message,
        } => (
            Status::BadRequest,
            UploadErrorResponse {
                row_number: Some(*row_number),
                error: Some(message.clone()),
                ..UploadErrorResponse::message("Failed to insert row.")
            },
        ),
        ImportError::Workbook(_) | ImportError::Database(_) => (
            Status::InternalServerError,
            UploadErrorResponse::message("CSV upload failed."),
        ),
    }
}

/// Map a spreadsheet import failure onto its status and body.
pub fn workbook_failure(err: &ImportError) -> (Status, UploadErrorResponse) {
    match err {
        ImportError::Workbook(workbook_err) => (
            Status::BadRequest,
            UploadErrorResponse {
                error: Some(workbook_err.to_string()),
                ..UploadErrorResponse::message("Excel file could not be read.")
            },
        ),
        ImportError::RowFailed {
            row_number,
            message,
        } => (
            Status::BadRequest,
            UploadErrorResponse {
                row_number: Some(*row_number),
                error: Some(message.clone()),
                ..UploadErrorResponse::message("Failed to insert row.")
            },
        ),
        _ => (
            Status::InternalServerError,
            UploadErrorResponse::message("Question import failed."),
        ),
    }
}

async fn read_upload(file: &TempFile<'_>) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(file.len() as usize);
    let reader = file.open().await?;
    tokio::pin!(reader);
    reader.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

fn present<'a, 'r>(file: &'a Option<TempFile<'r>>) -> Option<&'a TempFile<'r>> {
    file.as_ref().filter(|file| file.len() > 0)
}

/// Upsert every row of an uploaded CSV into `tableName`, all or nothing.
#[openapi(skip)]
#[post("/admin/upload-csv", data = "<upload>")]
pub async fn upload_csv(
    _admin: RequireAdmin,
    upload: Form<CsvUploadForm<'_>>,
    pool: &State<sqlx::PgPool>,
    registry: &State<TableRegistry>,
) -> Result<Json<ImportSummary>, UploadFailure> {
    let table_name = upload
        .table_name
        .as_deref()
        .map(str::trim)
        .filter(|name| registry.get(name).is_some())
        .ok_or_else(|| bad_request(UploadErrorResponse::message("Invalid table name.")))?;

    let file = present(&upload.file)
        .ok_or_else(|| bad_request(UploadErrorResponse::message("CSV file is required.")))?;

    let bytes = read_upload(file).await.map_err(|err| {
        log::error!("csv upload: could not read uploaded file: {}", err);
        status::Custom(
            Status::InternalServerError,
            Json(UploadErrorResponse::message("CSV upload failed.")),
        )
    })?;

    match CsvImporter::new(pool.inner(), registry.inner())
        .import(table_name, &bytes)
        .await
    {
        Ok(summary) => Ok(Json(summary)),
        Err(err) => {
            let (status, body) = csv_failure(&err);
            if status == Status::InternalServerError {
                log::error!("csv upload into {} failed: {}", table_name, err);
            }
            Err(status::Custom(status, Json(body)))
        }
    }
}

/// Insert practice questions from the first sheet of an `.xlsx` workbook.
#[openapi(skip)]
#[post("/admin/import/questions", data = "<upload>")]
pub async fn import_questions(
    _admin: RequireAdmin,
    upload: Form<WorkbookUploadForm<'_>>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Created<Json<WorkbookImportSummary>>, UploadFailure> {
    let file = present(&upload.file)
        .ok_or_else(|| bad_request(UploadErrorResponse::message("Excel file is required")))?;

    let bytes = read_upload(file).await.map_err(|err| {
        log::error!("question import: could not read uploaded file: {}", err);
        status::Custom(
            Status::InternalServerError,
            Json(UploadErrorResponse::message("Question import failed.")),
        )
    })?;

    match import_question_workbook(pool.inner(), &bytes).await {
        Ok(summary) => {
            Ok(status::Created::new("/api/v1/admin/questions").body(Json(summary)))
        }
        Err(err) => {
            let (status, body) = workbook_failure(&err);
            if status == Status::InternalServerError {
                log::error!("question import failed: {}", err);
            }
            Err(status::Custom(status, Json(body)))
        }
    }
}
