//! Pretrained graph loading and inference

use anyhow::{Context, Result};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tract_tensorflow::prelude::*;

use std::path::{Path, PathBuf};

use crate::config::ClassifierConfig;
use crate::image::{self, ImageType};
use crate::label::{self, Label};
use crate::labels;

/// A loaded, optimized classification graph together with its labels
pub struct Model {
    plan: TypedRunnableModel<TypedModel>,
    labels: Vec<String>,
    config: ClassifierConfig,
}

impl Model {
    /// Load the frozen graph and newline separated labels from the given files
    pub fn new(
        model_file: impl AsRef<Path>,
        label_file: impl AsRef<Path>,
        config: &ClassifierConfig,
    ) -> Result<Self> {
        config.validate()?;

        let plan = load_graph(model_file.as_ref(), config).map_err(|e| {
            log::error!("Error while loading model.");
            e
        })?;

        let labels = labels::load_labels(label_file).map_err(|e| {
            log::error!("Error while loading labels.");
            e
        })?;

        log::info!("Loaded model with {} labels", labels.len());

        Ok(Model {
            plan,
            labels,
            config: config.clone(),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Run the image through the graph and return every label, most probable first
    #[tracing::instrument(skip(self, data), fields(bytes = data.len()))]
    pub fn classify(&self, data: &[u8], image_type: ImageType) -> Result<Vec<Label>> {
        let input = image::preprocess(data, image_type, &self.config.preprocess)?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .context("Failed to run inference")?;
        let output = outputs
            .first()
            .context("Model produced no output tensor")?;
        let probabilities = output
            .to_array_view::<f32>()
            .context("Model output is not a float tensor")?;

        // [1, classes] and [classes] both flatten to the class axis
        let probabilities: Vec<f32> = probabilities.iter().copied().collect();
        log::debug!("Model produced {} probabilities", probabilities.len());

        Ok(label::rank(&probabilities, &self.labels))
    }

    pub fn classify_file(&self, path: impl AsRef<Path>) -> Result<Vec<Label>> {
        let path = path.as_ref();
        let image_type = ImageType::from_path(path)?;
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

        self.classify(&data, image_type)
            .with_context(|| format!("Failed to classify {}", path.display()))
    }

    /// Classify every file in parallel, one result per path in input order
    pub fn classify_batch(&self, paths: &[PathBuf]) -> Vec<Result<Vec<Label>>> {
        log::info!("Classifying {} images", paths.len());

        paths
            .par_iter()
            .map(|path| self.classify_file(path))
            .collect()
    }
}

#[tracing::instrument(skip(config))]
fn load_graph(
    model_file: &Path,
    config: &ClassifierConfig,
) -> Result<TypedRunnableModel<TypedModel>> {
    let mut model = tract_tensorflow::tensorflow()
        .model_for_path(model_file)
        .with_context(|| format!("Failed to import graph {}", model_file.display()))?;

    if let Some(input) = &config.input_node {
        model = model
            .with_input_names([input.as_str()])
            .with_context(|| format!("No input node named {input}"))?;
    }
    if let Some(output) = &config.output_node {
        model = model
            .with_output_names([output.as_str()])
            .with_context(|| format!("No output node named {output}"))?;
    }

    let shape = config.preprocess.input_shape();
    model = model.with_input_fact(0, f32::fact(shape).into())?;

    log::debug!("Optimizing graph for input {shape:?}");
    model
        .into_optimized()
        .context("Failed to optimize graph")?
        .into_runnable()
        .context("Failed to create session")
}
