use nimble_frame::{
    encode_pendant_checked, encode_state, ActuatorState, DecodedState, RangePolicy,
};

use crate::cmd::{EncodeArgs, RoleArg};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let policy = RangePolicy::from(args.policy);
    let fields = &args.fields;

    let (frame, state) = match args.role {
        RoleArg::Pendant => {
            if args.sensor_fault || args.temp_limit {
                return Err(CliError::new(
                    USAGE,
                    "--sensor-fault and --temp-limit need --role actuator",
                ));
            }
            let cmd = fields.to_command();
            let frame = encode_pendant_checked(&cmd, policy)
                .map_err(|err| frame_error("encode failed", err))?;
            (frame, DecodedState::Pendant(cmd))
        }
        RoleArg::Actuator => {
            if fields.air_out || fields.air_in || fields.set_exten {
                return Err(CliError::new(
                    USAGE,
                    "--air-out, --air-in and --set-exten need --role pendant",
                ));
            }
            let state = DecodedState::Actuator(ActuatorState {
                activated: fields.activated,
                sensor_fault: args.sensor_fault,
                temp_limit: args.temp_limit,
                air_spring: fields.air_spring,
                position: fields.position,
                force: fields.force,
            });
            let state = policy
                .apply_state(&state)
                .map_err(|err| frame_error("encode failed", err))?;
            (encode_state(&state), state)
        }
    };

    print_frame(&frame, &state, format);
    Ok(SUCCESS)
}
