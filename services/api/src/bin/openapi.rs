//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the stories REST API to `openapi.json`, or
//! to the path given as the first argument.

use stories_api::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn write_document(api_doc: utoipa::openapi::OpenApi, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let json = api_doc.to_pretty_json()?;
    std::fs::write(path, json)?;
    println!("OpenAPI document written to {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    write_document(ApiDoc::openapi(), &path)
}
