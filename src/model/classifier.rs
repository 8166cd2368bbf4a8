//! Feed-forward binary classifier
//!
//! Architecture: Input(n) → Linear(80) → LeakyReLU → BatchNorm
//!                        → Linear(50) → LeakyReLU → BatchNorm
//!                        → Linear(30) → LeakyReLU → BatchNorm
//!                        → Linear(1)  → Sigmoid

use burn::module::{Module, Param, RunningState};
use burn::nn::{BatchNorm, BatchNormConfig, Linear};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::activation::{leaky_relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::model::init::{kaiming_uniform, uniform_bias};
use crate::{ClassifierError, Result};

/// Widths of the three hidden layers
pub const HIDDEN_SIZES: [usize; 3] = [80, 50, 30];

/// Configuration for the classifier network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Input dimension (feature vector width)
    pub input_size: usize,
    /// Negative slope of the leaky ReLU
    pub leaky_slope: f64,
}

impl ClassifierConfig {
    pub fn new(input_size: usize) -> Self {
        ClassifierConfig {
            input_size,
            leaky_slope: 0.01,
        }
    }

    pub fn with_leaky_slope(mut self, leaky_slope: f64) -> Self {
        self.leaky_slope = leaky_slope;
        self
    }
}

/// One step of the network pipeline
pub trait Stage<B: Backend> {
    fn apply(&self, x: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// A hidden layer block: Linear → LeakyReLU → BatchNorm
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    norm: BatchNorm<B, 0>,
    leaky_slope: f64,
}

impl<B: Backend> HiddenBlock<B> {
    fn new<R: Rng + ?Sized>(
        device: &B::Device,
        in_dim: usize,
        out_dim: usize,
        leaky_slope: f64,
        rng: &mut R,
    ) -> Self {
        HiddenBlock {
            linear: init_linear(device, in_dim, out_dim, rng),
            norm: BatchNormConfig::new(out_dim).init(device),
            leaky_slope,
        }
    }

    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        reset_linear(&mut self.linear, rng);
        reset_norm(&mut self.norm);
    }
}

impl<B: Backend> Stage<B> for HiddenBlock<B> {
    fn apply(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = leaky_relu(x, self.leaky_slope);
        self.norm.forward(x)
    }
}

/// Output layer: Linear(1) → Sigmoid
#[derive(Module, Debug)]
pub struct OutputHead<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> Stage<B> for OutputHead<B> {
    fn apply(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        sigmoid(self.linear.forward(x))
    }
}

/// Feed-forward network producing P(label = 1) per sample
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    blocks: Vec<HiddenBlock<B>>,
    head: OutputHead<B>,
    input_size: usize,
}

impl<B: Backend> Classifier<B> {
    /// Create a new network, drawing initial weights from `rng`
    pub fn new<R: Rng + ?Sized>(
        device: &B::Device,
        config: &ClassifierConfig,
        rng: &mut R,
    ) -> Result<Self> {
        if config.input_size == 0 {
            return Err(ClassifierError::Config(
                "input_size must be at least 1".to_string(),
            ));
        }

        let mut blocks = Vec::with_capacity(HIDDEN_SIZES.len());
        let mut in_dim = config.input_size;
        for out_dim in HIDDEN_SIZES {
            blocks.push(HiddenBlock::new(
                device,
                in_dim,
                out_dim,
                config.leaky_slope,
                rng,
            ));
            in_dim = out_dim;
        }

        let head = OutputHead {
            linear: init_linear(device, in_dim, 1, rng),
        };

        Ok(Classifier {
            blocks,
            head,
            input_size: config.input_size,
        })
    }

    /// Re-draw every affine layer from `rng` and clear normalisation statistics.
    ///
    /// Layers are visited in the same order as construction, so the same
    /// generator state yields the same parameters as `new`. Parameter ids are
    /// kept, so an optimizer bound to this network stays bound.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for block in self.blocks.iter_mut() {
            block.reset(rng);
        }
        reset_linear(&mut self.head.linear, rng);
    }

    /// Feature vector width the network expects
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Features [batch, input_size]
    ///
    /// # Returns
    /// Probabilities [batch, 1]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.stages().fold(x, |x, stage| stage.apply(x))
    }

    fn stages(&self) -> impl Iterator<Item = &dyn Stage<B>> + '_ {
        self.blocks
            .iter()
            .map(|block| block as &dyn Stage<B>)
            .chain(std::iter::once(&self.head as &dyn Stage<B>))
    }

    /// Save model to file
    pub fn save(&self, path: &str) -> Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.into())
            .map_err(|e| ClassifierError::Record(e.to_string()))
    }

    /// Load model from file
    pub fn load(device: &B::Device, path: &str, config: &ClassifierConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.into(), device)
            .map_err(|e| ClassifierError::Record(e.to_string()))?;

        // Placeholder weights, overwritten by the record
        let model = Self::new(device, config, &mut StdRng::seed_from_u64(0))?;
        Ok(model.load_record(record))
    }
}

fn affine_tensors<B: Backend, R: Rng + ?Sized>(
    device: &B::Device,
    in_dim: usize,
    out_dim: usize,
    rng: &mut R,
) -> (Tensor<B, 2>, Tensor<B, 1>) {
    let weight = kaiming_uniform(rng, in_dim, in_dim * out_dim);
    let bias = uniform_bias(rng, out_dim);

    // burn stores Linear weights as [d_input, d_output]
    let weight = Tensor::from_data(TensorData::new(weight, [in_dim, out_dim]), device);
    let bias = Tensor::from_data(TensorData::new(bias, [out_dim]), device);
    (weight, bias)
}

fn init_linear<B: Backend, R: Rng + ?Sized>(
    device: &B::Device,
    in_dim: usize,
    out_dim: usize,
    rng: &mut R,
) -> Linear<B> {
    let (weight, bias) = affine_tensors(device, in_dim, out_dim, rng);
    Linear {
        weight: Param::from_tensor(weight),
        bias: Some(Param::from_tensor(bias)),
    }
}

fn reset_linear<B: Backend, R: Rng + ?Sized>(linear: &mut Linear<B>, rng: &mut R) {
    let [in_dim, out_dim] = linear.weight.dims();
    let device = linear.weight.device();
    let (weight, bias) = affine_tensors::<B, R>(&device, in_dim, out_dim, rng);

    linear.weight = Param::initialized(linear.weight.id, weight.require_grad());
    linear.bias = Some(match &linear.bias {
        Some(old) => Param::initialized(old.id, bias.require_grad()),
        None => Param::from_tensor(bias),
    });
}

/// Back to gamma = 1, beta = 0, running mean 0 and running variance 1, keeping ids
fn reset_norm<B: Backend>(norm: &mut BatchNorm<B, 0>) {
    let [channels] = norm.gamma.dims();
    let device = norm.gamma.device();

    norm.gamma = Param::initialized(
        norm.gamma.id,
        Tensor::ones([channels], &device).require_grad(),
    );
    norm.beta = Param::initialized(
        norm.beta.id,
        Tensor::zeros([channels], &device).require_grad(),
    );

    let mean_id = norm.running_mean.clone().into_record().id;
    let var_id = norm.running_var.clone().into_record().id;
    norm.running_mean = RunningState::with_id(mean_id, Tensor::zeros([channels], &device));
    norm.running_var = RunningState::with_id(var_id, Tensor::ones([channels], &device));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tensor_to_vec;
    use crate::model::init::{kaiming_bound, BIAS_BOUND};
    use burn::backend::NdArray;
    use burn::module::{AutodiffModule, ModuleVisitor, ParamId};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

    fn linear_values<B: Backend>(linear: &Linear<B>) -> (Vec<f32>, Vec<f32>) {
        let weight = tensor_to_vec(linear.weight.val()).unwrap();
        let bias = linear
            .bias
            .as_ref()
            .map(|b| tensor_to_vec(b.val()).unwrap())
            .unwrap_or_default();
        (weight, bias)
    }

    #[derive(Default)]
    struct ParamIds(Vec<ParamId>);

    impl<B: Backend> ModuleVisitor<B> for ParamIds {
        fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
            self.0.push(id);
        }
    }

    fn param_ids<B: Backend>(model: &Classifier<B>) -> Vec<ParamId> {
        let mut ids = ParamIds::default();
        model.visit(&mut ids);
        ids.0
    }

    fn all_affine_values<B: Backend>(model: &Classifier<B>) -> Vec<(Vec<f32>, Vec<f32>)> {
        model
            .blocks
            .iter()
            .map(|b| linear_values(&b.linear))
            .chain(std::iter::once(linear_values(&model.head.linear)))
            .collect()
    }

    #[test]
    fn test_forward_shape_and_range() {
        let device = Default::default();
        let config = ClassifierConfig::new(5);
        let model =
            Classifier::<TestBackend>::new(&device, &config, &mut StdRng::seed_from_u64(42))
                .unwrap();

        let x = Tensor::random([8, 5], burn::tensor::Distribution::Normal(0.0, 1.0), &device);
        let out = model.forward(x);

        assert_eq!(out.dims(), [8, 1]);
        for p in tensor_to_vec(out).unwrap() {
            assert!((0.0..=1.0).contains(&p), "probability out of range: {}", p);
        }
    }

    #[test]
    fn test_layer_shapes() {
        let device = Default::default();
        let model = Classifier::<TestBackend>::new(
            &device,
            &ClassifierConfig::new(7),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        let shapes: Vec<[usize; 2]> = model
            .blocks
            .iter()
            .map(|b| b.linear.weight.dims())
            .chain(std::iter::once(model.head.linear.weight.dims()))
            .collect();
        assert_eq!(shapes, vec![[7, 80], [80, 50], [50, 30], [30, 1]]);
        assert_eq!(model.input_size(), 7);
    }

    #[test]
    fn test_initialisation_bounds() {
        let device = Default::default();
        let model = Classifier::<TestBackend>::new(
            &device,
            &ClassifierConfig::new(4),
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();

        let fan_ins = [4, 80, 50, 30];
        for ((weight, bias), fan_in) in all_affine_values(&model).into_iter().zip(fan_ins) {
            let bound = kaiming_bound(fan_in);
            assert!(weight.iter().all(|w| w.abs() <= bound));
            assert!(bias.iter().all(|b| b.abs() <= BIAS_BOUND));
        }
    }

    #[test]
    fn test_zero_input_size_rejected() {
        let device = Default::default();
        let result = Classifier::<TestBackend>::new(
            &device,
            &ClassifierConfig::new(0),
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(ClassifierError::Config(_))));
    }

    #[test]
    fn test_reset_reproduces_construction() {
        let device = Default::default();
        let config = ClassifierConfig::new(6);

        let fresh =
            Classifier::<TestBackend>::new(&device, &config, &mut StdRng::seed_from_u64(11))
                .unwrap();

        let mut model =
            Classifier::<TestBackend>::new(&device, &config, &mut StdRng::seed_from_u64(99))
                .unwrap();
        assert_ne!(all_affine_values(&model), all_affine_values(&fresh));

        let ids_before = param_ids(&model);
        model.reset(&mut StdRng::seed_from_u64(11));

        assert_eq!(all_affine_values(&model), all_affine_values(&fresh));
        assert_eq!(param_ids(&model), ids_before);
        // 4 affine layers (weight + bias) and 3 norms (gamma, beta, mean, var)
        assert_eq!(ids_before.len(), 4 * 2 + 3 * 4);
    }

    #[test]
    fn test_reset_clears_running_statistics() {
        let device = Default::default();
        let config = ClassifierConfig::new(3);
        let mut model =
            Classifier::<TestAutodiffBackend>::new(&device, &config, &mut StdRng::seed_from_u64(5))
                .unwrap();

        // A training-mode pass moves the running mean away from zero
        let x = Tensor::random([16, 3], burn::tensor::Distribution::Normal(3.0, 1.0), &device);
        let _ = model.forward(x);
        let mean = tensor_to_vec(model.blocks[0].norm.running_mean.value_sync()).unwrap();
        assert!(mean.iter().any(|m| m.abs() > 1e-6));

        let ids_before = param_ids(&model);
        model.reset(&mut StdRng::seed_from_u64(5));
        assert_eq!(param_ids(&model), ids_before);

        for block in &model.blocks {
            let mean = tensor_to_vec(block.norm.running_mean.value_sync()).unwrap();
            let var = tensor_to_vec(block.norm.running_var.value_sync()).unwrap();
            let gamma = tensor_to_vec(block.norm.gamma.val()).unwrap();
            let beta = tensor_to_vec(block.norm.beta.val()).unwrap();
            assert!(mean.iter().all(|m| *m == 0.0));
            assert!(var.iter().all(|v| *v == 1.0));
            assert!(gamma.iter().all(|g| *g == 1.0));
            assert!(beta.iter().all(|b| *b == 0.0));
        }

        // Evaluation copy sees the same (cleared) statistics
        let inner = model.valid();
        let mean = tensor_to_vec(inner.blocks[0].norm.running_mean.value_sync()).unwrap();
        assert!(mean.iter().all(|m| *m == 0.0));
    }

    #[test]
    fn test_evaluation_passes_freeze_running_statistics() {
        let device = Default::default();
        let config = ClassifierConfig::new(3);
        let model =
            Classifier::<TestAutodiffBackend>::new(&device, &config, &mut StdRng::seed_from_u64(8))
                .unwrap();

        let x = Tensor::random([16, 3], burn::tensor::Distribution::Normal(2.0, 1.0), &device);
        let _ = model.forward(x);

        let inner = model.valid();
        let before = tensor_to_vec(inner.blocks[0].norm.running_mean.value_sync()).unwrap();
        assert!(before.iter().any(|m| m.abs() > 1e-6));

        for _ in 0..3 {
            let x = Tensor::random([16, 3], burn::tensor::Distribution::Normal(-5.0, 2.0), &device);
            let _ = inner.forward(x);
        }
        let after = tensor_to_vec(inner.blocks[0].norm.running_mean.value_sync()).unwrap();
        assert_eq!(before, after);

        // The autodiff model is untouched by evaluation passes too
        let train_side = tensor_to_vec(model.blocks[0].norm.running_mean.value_sync()).unwrap();
        assert_eq!(train_side, before);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier");
        let path = path.to_str().unwrap();

        let device = Default::default();
        let config = ClassifierConfig::new(4);
        let model =
            Classifier::<TestBackend>::new(&device, &config, &mut StdRng::seed_from_u64(21))
                .unwrap();
        model.save(path).unwrap();

        let loaded = Classifier::<TestBackend>::load(&device, path, &config).unwrap();
        assert_eq!(all_affine_values(&loaded), all_affine_values(&model));

        let x = Tensor::<TestBackend, 2>::from_floats([[0.1, -0.2, 0.3, 0.4]], &device);
        let a = tensor_to_vec(model.forward(x.clone())).unwrap();
        let b = tensor_to_vec(loaded.forward(x)).unwrap();
        assert_eq!(a, b);
    }
}
