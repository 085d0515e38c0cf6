//! Explicit run context.

use burn::prelude::*;

use crate::seed::Seed;

/// Device and master seed for one training run.
///
/// Built once by the command line front end, which seeds the backend from it
/// and hands its device and seed to the loaders, model and trainer. Library
/// entry points take a [`Seed`] or device directly.
#[derive(Debug, Clone)]
pub struct RunContext<B: Backend> {
    device: B::Device,
    seed: Seed,
}

impl<B: Backend> RunContext<B> {
    /// Create a context for `device` seeded with `seed`.
    pub fn new(device: B::Device, seed: Seed) -> Self {
        Self { device, seed }
    }

    /// The device every tensor of the run lives on.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Master seed of the run.
    pub fn seed(&self) -> Seed {
        self.seed
    }

    /// Seed the backend's own generator (parameter initialization).
    pub fn seed_backend(&self) {
        B::seed(self.seed.derive("backend").value());
    }
}

impl<B: Backend> Default for RunContext<B> {
    fn default() -> Self {
        Self::new(Default::default(), Seed::default())
    }
}

#[cfg(all(test, feature = "backend-ndarray"))]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    #[test]
    fn test_context_holds_seed() {
        let ctx = RunContext::<NdArray>::new(Default::default(), Seed::new(1));
        assert_eq!(ctx.seed(), Seed::new(1));
        assert_eq!(RunContext::<NdArray>::default().seed(), Seed::default());
    }

    #[test]
    fn test_seeded_backend_initializes_identically() {
        let ctx = RunContext::<NdArray>::new(Default::default(), Seed::new(7));
        let draw = || {
            ctx.seed_backend();
            Tensor::<NdArray, 1>::random([8], burn::tensor::Distribution::Default, ctx.device())
                .into_data()
                .to_vec::<f32>()
                .unwrap()
        };
        assert_eq!(draw(), draw());
    }
}
