//! Test doubles shared by the batch and session tests.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::{ConvertError, DocumentConverter};

/// Records every path it is asked to convert. Fails or panics for selected file names.
#[derive(Default)]
pub(crate) struct FakeConverter {
    calls: RefCell<Vec<PathBuf>>,
    fail_on: Vec<String>,
    panic_on: Vec<String>,
}

impl FakeConverter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_on: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn panicking_on(names: &[&str]) -> Self {
        Self {
            panic_on: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn call_names(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|p| file_name(p))
            .collect()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl DocumentConverter for FakeConverter {
    fn convert(&self, path: &Path) -> Result<String, ConvertError> {
        self.calls.borrow_mut().push(path.to_path_buf());
        let name = file_name(path);
        if self.panic_on.contains(&name) {
            panic!("workbook has no parts");
        }
        if self.fail_on.contains(&name) {
            return Err(ConvertError::Format {
                format: "PDF",
                message: "corrupt xref table".to_string(),
            });
        }
        Ok(format!("# {}\n\nconverted from {}\n", name, name))
    }
}
