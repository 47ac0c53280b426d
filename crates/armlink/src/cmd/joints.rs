use armlink_robot::JointRegistry;

use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_joints, OutputFormat};

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let joints: Vec<_> = JointRegistry::new().iter().cloned().collect();
    print_joints(&joints, format);
    Ok(SUCCESS)
}
