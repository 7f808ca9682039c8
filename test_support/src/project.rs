//! Sandbox FPGA projects for integration tests.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

/// Project file for an iCE40 HX8K board.
pub const ICE40_CONFIG: &str = "[project]\narch = \"ice40\"\nfpga_type = \"hx8k\"\nfpga_pack = \"ct256\"\n";

/// A temporary project directory removed on drop.
#[derive(Debug)]
pub struct ProjectFixture {
    tmp: TempDir,
    root: Utf8PathBuf,
}

impl ProjectFixture {
    /// Create an empty project.
    pub fn empty() -> Self {
        let tmp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf8 temp dir");
        Self { tmp, root }
    }

    /// Create a project holding `files`, given as `(name, contents)` pairs.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let fixture = Self::empty();
        for (name, text) in files {
            fixture.write(name, text);
        }
        fixture
    }

    /// A blinking-LED design for iCE40 with one testbench and a pin file.
    pub fn blinky() -> Self {
        Self::with_files(&[
            ("fpgaforge.toml", ICE40_CONFIG),
            ("main.v", "module main(output led); assign led = 1; endmodule\n"),
            ("main.pcf", "set_io led 99\n"),
            ("main_tb.v", "module main_tb; main uut(); endmodule\n"),
        ])
    }

    /// Write `text` to `name`, creating parent directories.
    pub fn write(&self, name: &str, text: &str) {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, text).expect("write fixture file");
    }

    /// Project root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of `name` inside the project.
    pub fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Borrow the underlying temporary directory.
    pub fn temp_dir(&self) -> &TempDir {
        &self.tmp
    }
}
