use crate::imports::*;

/// Validation and derived-field setup that must happen after a struct is
/// constructed or deserialized
pub trait Init {
    /// Specialized code to execute upon initialization.  For any struct with fields
    /// that implement `Init`, this should propagate down the hierarchy.
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Loading and saving via JSON
pub trait SerdeAPI: Serialize + for<'a> Deserialize<'a> + Init {
    const ACCEPTED_BYTE_FORMATS: &'static [&'static str] = &["json"];

    /// Write (serialize) an object to a JSON string
    fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read (deserialize) an object from a JSON string and run [Init::init]
    ///
    /// # Arguments
    /// * `json_str` - JSON-formatted string to deserialize from
    fn from_json<S: AsRef<str>>(json_str: S) -> anyhow::Result<Self> {
        let mut obj: Self = serde_json::from_str(json_str.as_ref())?;
        obj.init().with_context(|| format_dbg!())?;
        Ok(obj)
    }

    /// Write (serialize) an object to a file.
    /// Supported file extensions are listed in [`ACCEPTED_BYTE_FORMATS`](`SerdeAPI::ACCEPTED_BYTE_FORMATS`).
    ///
    /// # Arguments
    /// * `filepath` - The filepath at which to write the object
    fn to_file<P: AsRef<Path>>(&self, filepath: P) -> anyhow::Result<()> {
        let filepath = filepath.as_ref();
        let extension = file_extension(filepath)?;
        match extension.as_str() {
            "json" => std::fs::write(filepath, self.to_json()?)
                .with_context(|| format!("Could not write {filepath:?}"))?,
            _ => bail!(
                "Unsupported format {extension:?}, must be one of {:?}",
                Self::ACCEPTED_BYTE_FORMATS
            ),
        }
        Ok(())
    }

    /// Read (deserialize) an object from a file and run [Init::init].
    /// Supported file extensions are listed in [`ACCEPTED_BYTE_FORMATS`](`SerdeAPI::ACCEPTED_BYTE_FORMATS`).
    ///
    /// # Arguments
    /// * `filepath`: The filepath from which to read the object
    fn from_file<P: AsRef<Path>>(filepath: P) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        let extension = file_extension(filepath)?;
        match extension.as_str() {
            "json" => {
                let contents = std::fs::read_to_string(filepath)
                    .with_context(|| format!("Could not read {filepath:?}"))?;
                Self::from_json(contents)
            }
            _ => bail!(
                "Unsupported format {extension:?}, must be one of {:?}",
                Self::ACCEPTED_BYTE_FORMATS
            ),
        }
    }
}

fn file_extension(filepath: &Path) -> anyhow::Result<String> {
    Ok(filepath
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .with_context(|| format!("File extension could not be parsed: {filepath:?}"))?
        .to_lowercase())
}
