use crate::cmd::connection::one_shot;
use crate::cmd::{ConnectionArgs, JointTargetArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_action, OutputFormat};

pub fn run(
    args: JointTargetArgs,
    enabled: bool,
    conn: &ConnectionArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let action = if enabled { "enable" } else { "disable" };
    let out = one_shot(conn, action, args.joint, |link| {
        let result = match (args.joint, enabled) {
            (Some(joint), true) => link.enable_joint(joint),
            (Some(joint), false) => link.disable_joint(joint),
            (None, true) => {
                link.enable_all_joints();
                Ok(())
            }
            (None, false) => {
                link.disable_all_joints();
                Ok(())
            }
        };
        result
            .map(|()| None)
            .map_err(|err| link_error(&format!("{action} failed"), err))
    })?;
    print_action(&out, format);
    Ok(SUCCESS)
}
