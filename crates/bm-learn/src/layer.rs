use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;

/// Non-linearity applied after the affine step of a [`Dense`] layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// `max(0, z)`.
    Relu,
    /// `1 / (1 + e^-z)`.
    Sigmoid,
}

impl Activation {
    #[inline]
    fn apply(self, z: f32) -> f32 {
        match self {
            Self::Relu => z.max(0.0),
            Self::Sigmoid => sigmoid(z),
        }
    }
}

/// Numerically stable logistic function.
#[inline]
#[must_use]
pub fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Adam first/second moment estimates for one parameter tensor.
#[derive(Clone, Debug)]
struct Moments<D: ndarray::Dimension> {
    m: ndarray::Array<f32, D>,
    v: ndarray::Array<f32, D>,
}

impl<D: ndarray::Dimension> Moments<D> {
    fn zeros_like(shape: D) -> Self {
        Self {
            m: ndarray::Array::zeros(shape.clone()),
            v: ndarray::Array::zeros(shape),
        }
    }
}

/// Adam hyperparameters and step counter shared by every layer.
#[derive(Clone, Debug)]
pub struct Adam {
    /// Step size.
    pub learning_rate: f32,
    /// First-moment decay.
    pub beta1: f32,
    /// Second-moment decay.
    pub beta2: f32,
    /// Denominator guard.
    pub epsilon: f32,
    step: i32,
}

impl Adam {
    /// Adam with the usual decays (0.9 / 0.999) and ε = 1e-7.
    #[must_use]
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
        }
    }

    /// Advance the step counter; call once per mini-batch before updating layers.
    pub fn tick(&mut self) {
        self.step = self.step.saturating_add(1);
    }

    /// Bias-corrected step size for the current step.
    fn corrected_rate(&self) -> f32 {
        let t = self.step.max(1);
        self.learning_rate * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t))
    }

    fn update<D: ndarray::Dimension>(
        &self,
        param: &mut ndarray::Array<f32, D>,
        grad: &ndarray::Array<f32, D>,
        moments: &mut Moments<D>,
    ) {
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let lr = self.corrected_rate();
        ndarray::Zip::from(param)
            .and(grad)
            .and(&mut moments.m)
            .and(&mut moments.v)
            .for_each(|p, &g, m, v| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                *p -= lr * *m / (v.sqrt() + eps);
            });
    }
}

/// Values kept from the forward pass for back-propagation.
pub struct ForwardCache {
    input: Array2<f32>,
    output: Array2<f32>,
}

impl ForwardCache {
    /// Activated output of the layer.
    #[must_use]
    pub fn output(&self) -> &Array2<f32> {
        &self.output
    }
}

/// Fully-connected layer: `activation(x · W + b)`.
#[derive(Clone, Debug)]
pub struct Dense {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
    l2: f32,
    weight_moments: Moments<ndarray::Ix2>,
    bias_moments: Moments<ndarray::Ix1>,
}

impl Dense {
    /// Glorot-uniform kernel, zero bias.
    ///
    /// `l2` is the kernel penalty coefficient: the layer adds `l2 · Σw²` to the loss.
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        units: usize,
        activation: Activation,
        l2: f32,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / (inputs + units) as f32).sqrt();
        let weights = Array2::from_shape_fn((inputs, units), |_| rng.random_range(-limit..=limit));
        Self {
            weights,
            bias: Array1::zeros(units),
            activation,
            l2,
            weight_moments: Moments::zeros_like(ndarray::Ix2(inputs, units)),
            bias_moments: Moments::zeros_like(ndarray::Ix1(units)),
        }
    }

    /// Input width.
    #[must_use]
    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    /// Output width.
    #[must_use]
    pub fn units(&self) -> usize {
        self.weights.ncols()
    }

    /// Regularization term this layer adds to the loss.
    #[must_use]
    pub fn penalty(&self) -> f32 {
        if self.l2 == 0.0 {
            return 0.0;
        }
        self.l2 * self.weights.iter().map(|w| w * w).sum::<f32>()
    }

    /// Forward pass without keeping intermediates.
    #[must_use]
    pub fn forward(&self, input: ArrayView2<'_, f32>) -> Array2<f32> {
        let mut z = input.dot(&self.weights);
        z += &self.bias;
        let act = self.activation;
        z.mapv_inplace(|v| act.apply(v));
        z
    }

    /// Forward pass that keeps what [`backward`](Self::backward) needs.
    #[must_use]
    pub fn forward_train(&self, input: Array2<f32>) -> ForwardCache {
        let output = self.forward(input.view());
        ForwardCache { input, output }
    }

    /// Back-propagate and apply one Adam step.
    ///
    /// `grad_output` is dLoss/dOutput for ReLU layers. For the sigmoid
    /// output layer it must already be dLoss/dZ (cross-entropy and sigmoid
    /// fold into `p - y`). Returns dLoss/dInput, computed with the weights
    /// as they were before the update.
    pub fn backward(
        &mut self,
        cache: ForwardCache,
        grad_output: Array2<f32>,
        adam: &Adam,
    ) -> Array2<f32> {
        let mut grad_z = grad_output;
        if self.activation == Activation::Relu {
            ndarray::Zip::from(&mut grad_z)
                .and(&cache.output)
                .for_each(|g, &a| {
                    if a <= 0.0 {
                        *g = 0.0;
                    }
                });
        }

        let mut grad_w = cache.input.t().dot(&grad_z);
        if self.l2 != 0.0 {
            grad_w.scaled_add(2.0 * self.l2, &self.weights);
        }
        let grad_b = grad_z.sum_axis(Axis(0));
        let grad_input = grad_z.dot(&self.weights.t());

        adam.update(&mut self.weights, &grad_w, &mut self.weight_moments);
        adam.update(&mut self.bias, &grad_b, &mut self.bias_moments);

        grad_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
        assert_abs_diff_eq!(sigmoid(100.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sigmoid(-100.0), 0.0, epsilon = 1e-6);
        assert!(sigmoid(-100.0).is_finite());
    }

    #[test]
    fn glorot_init_respects_limit() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Dense::new(257, 64, Activation::Relu, 0.01, &mut rng);
        let limit = (6.0f32 / 321.0).sqrt();
        assert!(layer.weights.iter().all(|w| w.abs() <= limit));
        assert!(layer.bias.iter().all(|&b| b == 0.0));
        assert_eq!((layer.inputs(), layer.units()), (257, 64));
    }

    #[test]
    fn relu_forward_clamps_negatives() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = Dense::new(2, 2, Activation::Relu, 0.0, &mut rng);
        layer.weights = array![[1.0, -1.0], [1.0, -1.0]];
        let out = layer.forward(array![[1.0, 2.0]].view());
        assert_eq!(out, array![[3.0f32, 0.0]]);
    }

    #[test]
    fn penalty_is_l2_times_squared_norm() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = Dense::new(2, 1, Activation::Relu, 0.01, &mut rng);
        layer.weights = array![[3.0], [4.0]];
        assert_abs_diff_eq!(layer.penalty(), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn backward_matches_finite_difference() {
        // Single linear-ish path: relu layer with positive pre-activations,
        // loss = sum(output). dLoss/dInput = W · 1.
        let mut rng = StdRng::seed_from_u64(9);
        let mut layer = Dense::new(3, 2, Activation::Relu, 0.0, &mut rng);
        layer.weights = array![[0.5, 0.2], [0.1, 0.4], [0.3, 0.3]];
        layer.bias = array![1.0, 1.0];
        let x = array![[1.0, 2.0, 3.0]];
        let cache = layer.forward_train(x);
        let grad_in = layer.backward(cache, Array2::ones((1, 2)), &Adam::new(0.0));
        assert_abs_diff_eq!(grad_in[[0, 0]], 0.7, epsilon = 1e-6);
        assert_abs_diff_eq!(grad_in[[0, 1]], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(grad_in[[0, 2]], 0.6, epsilon = 1e-6);
    }

    #[test]
    fn adam_step_moves_against_gradient() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut layer = Dense::new(1, 1, Activation::Sigmoid, 0.0, &mut rng);
        layer.weights = array![[0.0]];
        let mut adam = Adam::new(0.1);
        adam.tick();
        let cache = layer.forward_train(array![[1.0]]);
        // Positive dLoss/dZ: weight and bias must decrease by ~lr.
        let _ = layer.backward(cache, array![[1.0]], &adam);
        assert_abs_diff_eq!(layer.weights[[0, 0]], -0.1, epsilon = 1e-4);
        assert_abs_diff_eq!(layer.bias[0], -0.1, epsilon = 1e-4);
    }
}
