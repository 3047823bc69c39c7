mod gateway;
mod limits;

use std::io::Write;

use tempfile::NamedTempFile;

pub fn write_config(contents: &str) -> Result<NamedTempFile, Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}
