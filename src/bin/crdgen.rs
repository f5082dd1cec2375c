// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generate CRD YAML manifests.
//!
//! Writes the `WorkloadObserver` CRD to `deploy/crds/`, or prints it to
//! stdout with `--stdout`.

use anyhow::{Context as _, Result};
use kube::CustomResourceExt;
use std::fs;
use std::path::Path;

use routewatch::crd::WorkloadObserver;

fn main() -> Result<()> {
    let stdout = std::env::args().any(|a| a == "--stdout");

    let crd = WorkloadObserver::crd();
    let yaml = serde_yaml::to_string(&crd).context("failed to serialize CRD")?;

    if stdout {
        println!("{yaml}");
        return Ok(());
    }

    let dir = Path::new("deploy/crds");
    fs::create_dir_all(dir).context("failed to create deploy/crds")?;
    let path = dir.join("workloadobservers.routewatch.firestoned.io.yaml");
    fs::write(&path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
