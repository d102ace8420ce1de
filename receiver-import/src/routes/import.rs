//! Spreadsheet upload endpoint for receiver imports.

use crate::credentials::CredentialService;
use crate::error::ApiError;
use crate::import::{
    ImportArguments, ImportConfig, ImportReport, PgSubscriberStore, ReceiverImporter,
};
use crate::models::DataResponse;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{FromForm, State, post};
use rocket_db_pools::sqlx::PgPool;
use tokio::io::AsyncReadExt;

/// Submitted import form. Every field is optional here so that missing
/// values come back as field errors in the report instead of a 422.
#[derive(FromForm)]
pub struct ImportForm<'r> {
    #[field(name = "importFile")]
    pub import_file: Option<TempFile<'r>>,
    #[field(name = "titleColumn")]
    pub title_column: Option<String>,
    #[field(name = "emailColumn")]
    pub email_column: Option<String>,
    #[field(name = "importPid")]
    pub import_pid: Option<String>,
    #[field(name = "hasTitleRow", default = false)]
    pub has_title_row: bool,
}

impl ImportForm<'_> {
    fn arguments(&self) -> ImportArguments {
        ImportArguments {
            file_size: self.import_file.as_ref().map(TempFile::len).unwrap_or(0),
            title_column: self.title_column.clone(),
            email_column: self.email_column.clone(),
            import_pid: self.import_pid.clone(),
            has_title_row: self.has_title_row,
        }
    }
}

async fn read_upload(file: &TempFile<'_>) -> Result<Vec<u8>, ApiError> {
    let reader = file
        .open()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Unable to read uploaded file: {e}")))?;
    tokio::pin!(reader);

    let mut bytes = Vec::with_capacity(file.len() as usize);
    reader
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Unable to read uploaded file: {e}")))?;
    Ok(bytes)
}

/// Import receivers from an uploaded spreadsheet into one container.
///
/// Field errors and per-row problems are part of the report; only failures
/// that abort the run (database, credential hashing) produce an error status.
#[post("/admin/receivers/import", data = "<form>")]
pub async fn import_receivers(
    form: Form<ImportForm<'_>>,
    pool: &State<PgPool>,
    config: &State<ImportConfig>,
) -> Result<Json<DataResponse<ImportReport>>, ApiError> {
    let arguments = form.arguments();
    let workbook = match form.import_file.as_ref() {
        Some(file) => read_upload(file).await?,
        None => Vec::new(),
    };

    let store = PgSubscriberStore::new(pool.inner().clone());
    let importer = ReceiverImporter::new(&store, **config, CredentialService::new()?);
    let report = importer.import(&arguments, workbook).await?;

    Ok(Json(DataResponse { data: report }))
}
