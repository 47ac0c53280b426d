use crate::cmd::connection::one_shot;
use crate::cmd::{ConnectionArgs, MoveArgs, MoveKind};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_action, OutputFormat};

pub fn run(args: MoveArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let (action, joint, value) = (action_name(args.kind), args.joint, args.value);
    let out = one_shot(conn, action, Some(joint), |link| {
        let sent = match args.kind {
            // Reports the angle after clamping to the joint's limits.
            MoveKind::Position => link.set_joint_position(joint, value),
            MoveKind::Velocity => link.set_joint_velocity(joint, value).map(|()| value),
            MoveKind::Torque => link.set_joint_torque(joint, value).map(|()| value),
        };
        sent.map(Some)
            .map_err(|err| link_error(&format!("{action} failed"), err))
    })?;
    print_action(&out, format);
    Ok(SUCCESS)
}

fn action_name(kind: MoveKind) -> &'static str {
    match kind {
        MoveKind::Position => "position",
        MoveKind::Velocity => "velocity",
        MoveKind::Torque => "torque",
    }
}
