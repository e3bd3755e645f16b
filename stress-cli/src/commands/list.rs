//! List registered actions.

use stress_core::ActionRegistry;

/// Print one action name per line.
pub fn run() {
    for name in ActionRegistry::with_builtins().names() {
        println!("{}", name);
    }
}
