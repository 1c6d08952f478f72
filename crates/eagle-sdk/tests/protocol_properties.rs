//! 协议层属性测试
//!
//! 使用 proptest 验证行重组、编码/回显解析和状态表的不变量。

use eagle_sdk::driver::{ActuatorRegistry, ApplyOutcome};
use eagle_sdk::protocol::{
    EagleCommand, LineReassembler, MotionFeedback, ProtocolEvent, parse_response,
};
use proptest::prelude::*;

/// 控制器行为模拟：把 `[f id force` 回显为 `]f id force position`
fn echo_force(command: &EagleCommand, position: i64) -> String {
    let encoded = command.encode();
    let body = encoded
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix('\r'))
        .expect("encoded command is framed");
    format!("]{} {}\r\n", body, position)
}

fn reassemble_in_chunks(input: &[u8], cuts: &[usize]) -> (Vec<String>, Vec<u8>) {
    let mut reassembler = LineReassembler::new();
    let mut lines = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        let end = cut.min(input.len()).max(start);
        lines.extend(reassembler.feed(&input[start..end]));
        start = end;
    }
    lines.extend(reassembler.feed(&input[start..]));
    (lines, reassembler.pending().to_vec())
}

proptest! {
    /// 一次喂入与任意分块喂入得到相同的行和相同的剩余缓冲
    #[test]
    fn reassembly_is_split_independent(
        input in proptest::collection::vec(
            prop_oneof![Just(b'\n'), Just(b'\r'), Just(b' '), b'0'..=b'9', b'a'..=b'z', Just(b']')],
            0..256,
        ),
        mut cuts in proptest::collection::vec(0usize..256, 0..16),
    ) {
        cuts.sort_unstable();

        let mut whole = LineReassembler::new();
        let expected_lines = whole.feed(&input);
        let expected_pending = whole.pending().to_vec();

        let newlines = input.iter().filter(|&&b| b == b'\n').count();
        prop_assert_eq!(expected_lines.len(), newlines);

        let (lines, pending) = reassemble_in_chunks(&input, &cuts);
        prop_assert_eq!(lines, expected_lines);
        prop_assert_eq!(pending, expected_pending);
    }

    /// 编码 → 控制器回显 → 解析，力和 ID 原样恢复
    #[test]
    fn force_echo_reconstructs_command(
        id in 0u8..8,
        force in -32768i32..=32767,
        position in any::<i32>(),
    ) {
        let command = EagleCommand::Force { id, force };
        let event = parse_response(&echo_force(&command, position as i64)).unwrap();
        prop_assert_eq!(
            event,
            ProtocolEvent::Force(MotionFeedback {
                id: id as i64,
                force,
                position: position as i64,
            })
        );
    }

    /// init 名单只使能列出的执行器
    #[test]
    fn init_roster_enumerates_listed_ids(
        ids in proptest::collection::btree_set(0u8..8, 0..8),
    ) {
        let mut registry = ActuatorRegistry::new(8).unwrap();
        let line = ids
            .iter()
            .fold("]init".to_string(), |acc, id| format!("{} {}", acc, id));
        prop_assert!(registry.process_line(&line).is_applied());

        let expected: Vec<u8> = ids.into_iter().collect();
        prop_assert_eq!(registry.available_actuators(), expected);
    }

    /// invalid_act 把对应执行器移出可用列表
    #[test]
    fn invalid_act_clears_enumeration(target in 0u8..8) {
        let mut registry = ActuatorRegistry::new(8).unwrap();
        registry.process_line("]init 0 1 2 3 4 5 6 7");

        let outcome = registry.process_line(&format!("]invalid_act {}", target));
        prop_assert_eq!(outcome, ApplyOutcome::ControllerError);
        prop_assert!(!registry.actuator(target).unwrap().enumerated);
        prop_assert!(!registry.available_actuators().contains(&target));
        prop_assert_eq!(registry.available_actuators().len(), 7);
    }

    /// 数值字段损坏的行不修改任何状态
    #[test]
    fn malformed_force_line_is_noop(
        id in 0u8..8,
        garbage in "[a-z]{1,8}",
        position in any::<i32>(),
    ) {
        let mut registry = ActuatorRegistry::new(8).unwrap();
        registry.process_line(&format!("]f {} 7 11", id));
        let before = registry.snapshot();

        let line = format!("]f {} {} {}", id, garbage, position);
        prop_assert!(parse_response(&line).is_err());
        prop_assert_eq!(registry.process_line(&line), ApplyOutcome::ParseFailed);

        let after = registry.snapshot();
        prop_assert_eq!(after.actuators, before.actuators);
        prop_assert!(after.last_error.is_some());
    }

    /// 扩展力反馈电压按毫伏缩放为伏
    #[test]
    fn extended_force_voltage_scaling(millivolts in 0i32..60_000) {
        let mut registry = ActuatorRegistry::new(8).unwrap();
        registry.process_line(&format!("]exf 0 10 20000 0 25 {} 15", millivolts));

        let record = registry.actuator(0).unwrap();
        let expected = millivolts as f32 / 1000.0;
        prop_assert!((record.voltage - expected).abs() < 1e-3);
        prop_assert_eq!(record.force, 10);
        prop_assert_eq!(record.position, 20000);
    }
}

#[test]
fn extended_force_voltage_example() {
    let mut registry = ActuatorRegistry::new(8).unwrap();
    registry.process_line("]exf 0 10 20000 0 25 3300 15");
    let record = registry.actuator(0).unwrap();
    assert!((record.voltage - 3.3).abs() < f32::EPSILON);
    assert_eq!(record.temperature, 25.0);
    assert_eq!(record.power, 15.0);
}
