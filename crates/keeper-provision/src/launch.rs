use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::errors::ProvisionError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchPlan {
    pub cwd: PathBuf,
    pub argv: Vec<String>, // e.g. ["java","-Xmx8G","-Xms8G","-jar","server.jar","nogui"]
}

impl LaunchPlan {
    pub fn program(&self) -> Result<&str, ProvisionError> {
        self.argv
            .first()
            .map(String::as_str)
            .ok_or_else(|| ProvisionError::Invalid("empty launch command".to_string()))
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// `java -Xmx<heap> -Xms<heap> [extra...] -jar <jar> nogui`, run from the server directory.
pub fn java_launch_plan(
    cwd: PathBuf,
    java: &str,
    heap: &str,
    jar: &str,
    extra_args: &[String],
) -> Result<LaunchPlan, ProvisionError> {
    validate_heap(heap)?;
    if jar.trim().is_empty() {
        return Err(ProvisionError::Invalid("server jar name is empty".to_string()));
    }

    let mut argv = vec![
        java.to_string(),
        format!("-Xmx{heap}"),
        format!("-Xms{heap}"),
    ];
    argv.extend(extra_args.iter().cloned());
    argv.extend(["-jar".to_string(), jar.to_string(), "nogui".to_string()]);

    Ok(LaunchPlan { cwd, argv })
}

/// Heap sizes the JVM accepts: digits followed by an optional K/M/G unit.
fn validate_heap(heap: &str) -> Result<(), ProvisionError> {
    let digits = heap.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    let suffix_len = heap.len() - digits.len();
    if digits.is_empty() || suffix_len > 1 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProvisionError::Invalid(format!("invalid heap size: {heap:?}")));
    }
    Ok(())
}

/// Leaves headroom for the OS on small hosts and caps the heap on large ones.
pub fn default_heap() -> String {
    let mut system = System::new();
    system.refresh_memory();
    let total_gb = system.total_memory() / 1024 / 1024 / 1024;
    let heap_gb = if total_gb <= 8 {
        total_gb.saturating_sub(2).max(1)
    } else if total_gb >= 24 {
        16
    } else {
        8
    };
    format!("{heap_gb}G")
}
