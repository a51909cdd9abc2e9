use std::sync::Arc;

/// Clocked behavior shared by every fabric component.
pub trait ModuleBehaviors {
    /// Advance the component by one clock edge.
    fn tick_one(&mut self);

    /// Return internal state to its power-on value.
    fn reset(&mut self) {}
}

pub trait Parameterizable {
    type ConfigType;

    fn conf(&self) -> &Self::ConfigType;

    fn init_conf(&mut self, conf: Arc<Self::ConfigType>);
}
