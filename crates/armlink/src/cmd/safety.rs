use crate::cmd::connection::one_shot;
use crate::cmd::ConnectionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_action, OutputFormat};

pub fn estop(conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = one_shot(conn, "emergency_stop", None, |link| {
        link.emergency_stop();
        Ok(None)
    })?;
    print_action(&out, format);
    Ok(SUCCESS)
}

pub fn reset(conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = one_shot(conn, "reset_zero", None, |link| {
        link.reset_to_zero_position();
        Ok(None)
    })?;
    print_action(&out, format);
    Ok(SUCCESS)
}
