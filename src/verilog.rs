//! Verilog generation for the sensor's digital wrapper.
//!
//! The wrapper (oscillator instantiation, readout counter) is kept as
//! a set of template files that reference a fixed parameter set:
//! expansion substitutes the parameters into every template in an
//! input directory and writes the expanded files to an output
//! directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use thiserror::Error as ThisError;
use tracing::{debug, info};

/// The result type returned by template expansion functions.
pub type Result<T> = std::result::Result<T, Error>;

/// Possible template expansion errors.
#[derive(ThisError, Debug)]
pub enum Error {
    /// I/O error.
    #[error("io error")]
    Io(#[from] std::io::Error),
    /// Template parsing/rendering error.
    #[error("template error")]
    Template(#[from] tera::Error),
}

/// The file extension identifying expandable templates.
pub const TEMPLATE_EXT: &str = "template";

/// The directory containing the stock temperature sensor templates.
pub const TEMPLATES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

/// Substitution parameters for the temperature sensor templates.
///
/// Every placeholder referenced by a template must correspond to a
/// field here; rendering a template that references anything else
/// fails with [`Error::Template`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TempsenseParams {
    /// The name of the generated sensor instance.
    pub design_name: String,
    /// The number of inverters in the sensor's ring oscillator.
    pub ninv: usize,
    /// The NAND2 standard cell gating the ring oscillator.
    pub nand2: String,
    /// The inverter standard cell.
    pub inv: String,
    /// The buffer standard cell.
    pub buf: String,
    /// The name of the buffer cell's output pin.
    pub nbout: String,
    /// Header text placed at the top of each generated file.
    pub header: String,
}

impl Default for TempsenseParams {
    fn default() -> Self {
        Self {
            design_name: "tempsenseInst".to_string(),
            ninv: 6,
            nand2: "sky130_fd_sc_hd__nand2_1".to_string(),
            inv: "sky130_fd_sc_hd__inv_1".to_string(),
            buf: "sky130_fd_sc_hd__buf_1".to_string(),
            nbout: "X".to_string(),
            header: "Generated by tempsensegen".to_string(),
        }
    }
}

/// Expands a single template file into `output_dir`.
///
/// The output file keeps the template's file name with the
/// `.template` suffix stripped (`counter.v.template` becomes
/// `counter.v`). Creates `output_dir` if absent.
pub fn expand_file(
    template: &Path,
    output_dir: &Path,
    params: &TempsenseParams,
) -> Result<PathBuf> {
    let name = output_name(template);

    let mut tera = Tera::default();
    tera.add_template_file(template, Some(&name))?;
    let context = Context::from_serialize(params)?;
    let contents = tera.render(&name, &context)?;

    fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(&name);
    fs::write(&output_path, contents)?;
    info!(
        "expanded {} to {}",
        template.display(),
        output_path.display()
    );

    Ok(output_path)
}

/// Expands every template in `input_dir` into `output_dir`.
///
/// Regular files with the [`TEMPLATE_EXT`] extension are expanded in
/// file-name order; everything else is skipped. Creates `output_dir`
/// if absent. A failed expansion aborts the run, leaving the files
/// already written in place.
pub fn expand_dir(
    input_dir: &Path,
    output_dir: &Path,
    params: &TempsenseParams,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let mut templates = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(TEMPLATE_EXT) {
            debug!("skipping {}", path.display());
            continue;
        }
        templates.push(path);
    }
    templates.sort();

    let mut outputs = Vec::with_capacity(templates.len());
    for template in templates {
        outputs.push(expand_file(&template, output_dir, params)?);
    }

    Ok(outputs)
}

fn output_name(template: &Path) -> String {
    if template.extension().and_then(|ext| ext.to_str()) == Some(TEMPLATE_EXT) {
        template
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    } else {
        template
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const TEST_BUILD_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/build");

    #[test_log::test]
    fn expands_stock_templates() {
        let output_dir = PathBuf::from(TEST_BUILD_PATH).join("expands_stock_templates");
        let params = TempsenseParams::default();

        let outputs = expand_dir(Path::new(TEMPLATES_PATH), &output_dir, &params)
            .expect("failed to expand templates");

        assert!(output_dir.is_dir());
        assert_eq!(
            outputs,
            [
                output_dir.join("counter.v"),
                output_dir.join("tempsense.v")
            ]
        );

        let tempsense =
            fs::read_to_string(output_dir.join("tempsense.v")).expect("missing expanded file");
        assert!(tempsense.contains(&params.header));
        assert!(tempsense.contains("module tempsenseInst ("));
        assert!(tempsense.contains(&params.nand2));
        assert!(tempsense.contains(".X(clk_out)"));
        assert_eq!(tempsense.matches(&params.inv).count(), params.ninv);
        assert!(!tempsense.contains("{{"));

        let counter =
            fs::read_to_string(output_dir.join("counter.v")).expect("missing expanded file");
        assert!(counter.contains("module tempsenseInst_counter"));
    }

    #[test_log::test]
    fn skips_non_template_files() {
        let work_dir = PathBuf::from(TEST_BUILD_PATH).join("skips_non_template_files");
        let input_dir = work_dir.join("input");
        let output_dir = work_dir.join("output");
        fs::create_dir_all(&input_dir).unwrap();
        fs::write(input_dir.join("osc.v.template"), "// {{ header }}\n").unwrap();
        fs::write(input_dir.join("notes.txt"), "not a template\n").unwrap();

        let outputs = expand_dir(&input_dir, &output_dir, &TempsenseParams::default())
            .expect("failed to expand templates");

        assert_eq!(outputs, [output_dir.join("osc.v")]);
        assert!(output_dir.join("osc.v").is_file());
        assert!(!output_dir.join("notes.txt").exists());

        let osc = fs::read_to_string(output_dir.join("osc.v")).unwrap();
        assert_eq!(osc, "// Generated by tempsensegen\n");
    }

    #[test_log::test]
    fn missing_parameter_is_an_error() {
        let work_dir = PathBuf::from(TEST_BUILD_PATH).join("missing_parameter_is_an_error");
        let input_dir = work_dir.join("input");
        fs::create_dir_all(&input_dir).unwrap();
        let template = input_dir.join("bad.v.template");
        fs::write(&template, "{{ does_not_exist }}\n").unwrap();

        let err = expand_file(&template, &work_dir.join("output"), &TempsenseParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test_log::test]
    fn missing_input_dir_is_an_error() {
        let work_dir = PathBuf::from(TEST_BUILD_PATH).join("missing_input_dir_is_an_error");

        let err = expand_dir(
            &work_dir.join("does_not_exist"),
            &work_dir.join("output"),
            &TempsenseParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
