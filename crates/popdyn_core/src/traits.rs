use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the model evaluators.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// An autonomous or time-dependent system of ordinary differential equations.
pub trait OdeSystem<T: Scalar> {
    /// Returns the dimension of the state space (number of compartments).
    fn dimension(&self) -> usize;

    /// Evaluates the right-hand side of the system.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for steppers that advance a system by a fixed step.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl OdeSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
