//! File download with server-suggested naming.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use reqwest::header::CONTENT_DISPOSITION;

use crate::http::{ApiClient, classify};
use crate::runtime::Runtime;

/// Where a downloaded file ends up.
pub enum SaveAs<'a> {
    /// Exact target path; the Content-Disposition header is ignored.
    Path(&'a Path),
    /// Under this directory, named by the server's Content-Disposition.
    ServerName(&'a Path),
}

/// Outcome of a completed download.
#[derive(Debug, PartialEq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Downloads a file from the API, streaming chunks to a writer created
/// through the runtime. A JSON body turns the request into a POST (report
/// endpoints take their parameters that way); without one it is a GET.
///
/// A non-success status is classified and dispatched before the target file
/// is created.
#[tracing::instrument(skip(client, runtime, body, save_as))]
pub async fn download<R: Runtime>(
    client: &ApiClient,
    runtime: &R,
    path: &str,
    host: Option<&str>,
    body: Option<&serde_json::Value>,
    save_as: SaveAs<'_>,
) -> Result<Downloaded> {
    let _busy = client.busy().start();
    let url = client.config().request_url(path, host);
    info!("Downloading {}...", url);

    let request = match body {
        Some(body) => client.inner().post(&url).json(body),
        None => client.inner().get(&url),
    };
    let mut response = client.execute(client.authorize(request)).await?;

    let target = match save_as {
        SaveAs::Path(path) => path.to_path_buf(),
        SaveAs::ServerName(dir) => {
            let name = response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|value| value.to_str().ok())
                .and_then(attachment_filename)
                .ok_or_else(|| anyhow!("Server did not provide an attachment filename"))?;
            // Keep only the final component; the server does not get to pick
            // a directory.
            let name = Path::new(&name)
                .file_name()
                .map(|n| n.to_owned())
                .ok_or_else(|| anyhow!("Unusable attachment filename {:?}", name))?;
            dir.join(name)
        }
    };

    let mut writer = runtime
        .create_file(&target)
        .with_context(|| format!("Failed to create {:?}", target))?;
    let mut bytes: u64 = 0;

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            // The request deadline keeps running while the body streams; a
            // timeout here is dispatched the same as one at send time.
            Err(e) => return Err(client.dispatch_failure(classify(e)).into()),
        };
        writer
            .write_all(&chunk)
            .context("Failed to write chunk to file")?;
        bytes += chunk.len() as u64;
    }

    debug!("Downloaded {:.2} MB", bytes as f64 / (1024.0 * 1024.0));

    Ok(Downloaded { path: target, bytes })
}

/// Extracts the filename from an `attachment; filename=...` header value.
fn attachment_filename(value: &str) -> Option<String> {
    let rest = value.trim().strip_prefix("attachment")?;
    rest.split(';')
        .filter_map(|part| part.trim().strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .find(|name| !name.is_empty())
}
