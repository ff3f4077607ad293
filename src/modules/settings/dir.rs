//
// Copyright (c) 2025 rustmailer.com (https://rustmailer.com)
//
// This file is part of the Onebox Email Triage Project
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::modules::error::OneboxResult;

/// Layout of the data root directory.
#[derive(Clone, Debug)]
pub struct DataDirManager {
    pub root_dir: PathBuf,
    pub index_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl DataDirManager {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root_dir = root_dir.as_ref().to_path_buf();
        Self {
            index_dir: root_dir.join("index").join("emails"),
            log_dir: root_dir.join("logs"),
            root_dir,
        }
    }

    pub fn initialize(&self) -> OneboxResult<()> {
        for dir in [&self.index_dir, &self.log_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                info!("Created data directory {:?}", dir);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_creates_layout() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = DataDirManager::new(temp.path());
        dirs.initialize().unwrap();
        assert!(dirs.index_dir.is_dir());
        assert!(dirs.log_dir.is_dir());
        // second call is a no-op
        dirs.initialize().unwrap();
    }
}
