//! Fixture builder: a config, a case directory and shell scripts posing as
//! the synthesis tools.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fx = Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        };
        fs::create_dir_all(fx.bin()).unwrap();
        fs::create_dir_all(fx.path().join("cases")).unwrap();

        // `balance 1 <in> <out>`: writes the output netlist and prints stats.
        fx.tool(
            "balance",
            "#!/bin/sh\n\
             echo 'module top; endmodule' > \"$3\"\n\
             echo 'area(before/after) : 20/10'\n\
             echo 'level(before/after) : 5/4'\n",
        );
        // Equivalence checks always succeed.
        fx.tool("abc", "#!/bin/sh\necho 'Networks are equivalent.'\n");
        fx
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn bin(&self) -> PathBuf {
        self.path().join("bin")
    }

    pub fn tool(&self, name: &str, script: &str) {
        let path = self.bin().join(name);
        fs::write(&path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    pub fn case(&self, name: &str, testinfo: &str) -> PathBuf {
        let dir = self.path().join("cases").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("testinfo.toml"), testinfo).unwrap();
        fs::write(dir.join(format!("{name}.aig")), "aig 0 0 0 0 0\n").unwrap();
        dir
    }

    pub fn config(&self, extra: &str) -> PathBuf {
        let path = self.path().join("qorgate.toml");
        let text = format!(
            "[global]\ncase_dir = \"cases\"\nresults = \"results\"\ntimeout = \"30s\"\njobs = 2\n{extra}\n\
             [tools]\nabc = \"{}\"\n",
            self.bin().join("abc").display()
        );
        fs::write(&path, text).unwrap();
        path
    }

    /// `PATH` with the fake tools first.
    pub fn path_env(&self) -> String {
        let inherited = std::env::var("PATH").unwrap_or_default();
        format!("{}:{inherited}", self.bin().display())
    }

    /// The single timestamped run directory under `results/`.
    pub fn run_dir(&self) -> PathBuf {
        let mut runs: Vec<PathBuf> = fs::read_dir(self.path().join("results"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(runs.len(), 1, "expected one run dir, got {runs:?}");
        runs.remove(0)
    }
}
