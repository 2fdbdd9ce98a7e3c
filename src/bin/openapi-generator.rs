//! Writes the OpenAPI document to stdout or a file.

use quiz_duel_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match ApiDoc::openapi().to_pretty_json() {
        Ok(doc) => println!("{doc}"),
        Err(err) => {
            eprintln!("failed to render OpenAPI document: {err}");
            std::process::exit(1);
        }
    }
}
