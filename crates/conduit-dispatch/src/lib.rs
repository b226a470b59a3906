pub mod capability_stub;
pub mod demo_driver;
pub mod dispatcher;
pub mod signal_bus;

pub use capability_stub::{DefaultPolicy, StubCapabilityStore};
pub use demo_driver::{DemoDriver, FaultKind, Scenario, ScenarioOutcome};
pub use dispatcher::{AuthorizedOutcome, Dispatcher, GenerateOpts};
pub use signal_bus::{BroadcastSignalBus, Signal};
