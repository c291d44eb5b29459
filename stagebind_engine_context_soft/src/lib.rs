/*!
# Stagebind Engine - Software Context Backend

Slot-based execution context implemented in software for the stagebind
engine.

The soft context keeps real per-stage slot tables, records deferred command
lists and replays them on the immediate context. Its debug layer counts
hazards (a resource bound in two conflicting roles) and ignored calls, which
makes it the ground truth the engine's committed mirror is checked against.

```no_run
use stagebind_engine::stagebind::{Config, RenderDevice};
use stagebind_engine_context_soft::{print_stats_report, SoftContext};

let device = RenderDevice::new(Config::diagnostics());
let native = SoftContext::immediate(device.object_registry());
let debug = native.debug();
let mut context = device.create_immediate_context(Box::new(native));
// ... set pipelines, commit bindings, draw ...
print_stats_report(&debug.stats());
```

Enable the `soft-debug-log` feature to also log every hazard through the
engine logger.
*/

mod debug;
mod soft_command_list;
mod soft_context;

pub use soft_context::SoftContext;
pub use soft_command_list::{SoftCommand, SoftCommandList};

// Re-export debug utilities
pub use debug::{print_stats_report, SoftDebug, SoftStats};
