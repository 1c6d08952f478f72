//! 驱动端到端测试
//!
//! 使用 `MockSerialAdapter` 模拟控制器固件，覆盖握手、枚举、力控循环和析构休眠。

use eagle_sdk::prelude::*;
use eagle_sdk::serial::{MockSerialAdapter, MockSerialHandle};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// 简易固件：记住被休眠的执行器，按命令回显
fn firmware(roster: &'static [u8]) -> (MockSerialAdapter, MockSerialHandle, Arc<Mutex<BTreeSet<u8>>>) {
    let (adapter, handle) = MockSerialAdapter::new();
    let asleep = Arc::new(Mutex::new(BTreeSet::new()));
    let asleep_fw = asleep.clone();

    handle.set_responder(move |cmd| {
        let tokens: Vec<&str> = cmd.split(' ').collect();
        let id = || tokens.get(1).and_then(|s| s.parse::<u8>().ok());
        let reply = match tokens[0] {
            "[handshake" => "]response".to_string(),
            "[init" => roster
                .iter()
                .fold("]init".to_string(), |acc, id| format!("{} {}", acc, id)),
            "[f" | "[exf" => {
                let id = id()?;
                if !roster.contains(&id) {
                    return Some(format!("]invalid_act {}\r\n", id));
                }
                let force = tokens.get(2)?;
                if tokens[0] == "[f" {
                    format!("]f {} {} {}", id, force, 5000 + id as i32)
                } else {
                    format!("]exf {} {} 5000 0 31 24000 2", id, force)
                }
            },
            "[sleep" => {
                let id = id()?;
                asleep_fw.lock().unwrap().insert(id);
                format!("]sleep {}", id)
            },
            "[pol" => format!("]pol {} {}", id()?, tokens.get(2)?),
            "[ready" => return None,
            other => format!("]invalid_arg {} {}", tokens.get(1).unwrap_or(&"?"), other),
        };
        Some(format!("{}\r\n", reply))
    });

    (adapter, handle, asleep)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn test_session_lifecycle() {
    let (adapter, handle, asleep) = firmware(&[0, 2, 5]);

    {
        let eagle = EagleBuilder::new()
            .port("mock")
            .handshake_timeout(Duration::from_secs(2))
            .build_with(adapter)
            .unwrap();

        eagle.confirm_port().unwrap();
        eagle.enumerate().unwrap();
        assert!(wait_until(|| eagle.available_actuators() == vec![0, 2, 5]));

        eagle.system_ready().unwrap();

        // 模拟弹簧力控循环：读取位置，计算力，整包下发
        for _ in 0..20 {
            let package: Vec<EagleCommand> = eagle.read_registry(|r| {
                r.actuators()
                    .iter()
                    .filter(|a| a.enumerated)
                    .map(|a| EagleCommand::Force {
                        id: a.id,
                        force: -((a.position / 100) as i32),
                    })
                    .collect()
            });
            eagle.send_realtime_package(package).unwrap();
            thread::sleep(Duration::from_millis(1));
        }

        assert!(wait_until(|| eagle.actuator(5).map(|a| a.position) == Some(5005)));
        assert!(wait_until(|| eagle.actuator(5).map(|a| a.force) == Some(-50)));
        assert!(eagle.is_connected());
        assert!(eagle.get_metrics().tx_commands_total > 0);
    }

    assert_eq!(*asleep.lock().unwrap(), BTreeSet::from([0, 2, 5]));
    assert!(handle.written_commands().contains(&"[ready".to_string()));
}

#[test]
fn test_invalid_actuator_removes_from_roster() {
    let (adapter, _handle, _asleep) = firmware(&[1, 3]);
    let eagle = EagleBuilder::new()
        .sleep_on_drop(false)
        .build_with(adapter)
        .unwrap();

    eagle.send_reliable(EagleCommand::Enumerate).unwrap();
    assert!(wait_until(|| eagle.available_actuators() == vec![1, 3]));

    eagle
        .send_reliable(EagleCommand::Force { id: 4, force: 10 })
        .unwrap();
    assert!(wait_until(|| {
        eagle.last_error().as_deref() == Some("Target actuator 4 not available")
    }));
    assert_eq!(eagle.available_actuators(), vec![1, 3]);
    assert_eq!(eagle.get_metrics().rx_controller_errors, 1);
}

#[test]
fn test_extended_force_telemetry() {
    let (adapter, _handle, _asleep) = firmware(&[0]);
    let eagle = EagleBuilder::new()
        .dual_thread(false)
        .sleep_on_drop(false)
        .build_with(adapter)
        .unwrap();

    eagle
        .send_command(DriverCommand::reliable(EagleCommand::ExtendedForce { id: 0, force: 12 }))
        .unwrap();
    assert!(wait_until(|| eagle.actuator(0).map(|a| a.force) == Some(12)));

    let record = eagle.actuator(0).unwrap();
    assert_eq!(record.temperature, 31.0);
    assert!((record.voltage - 24.0).abs() < 1e-6);
    assert_eq!(record.power, 2.0);
    assert!(record.enumerated);
}

#[test]
fn test_handshake_timeout_on_silent_port() {
    let (adapter, _handle) = MockSerialAdapter::new();
    let eagle = EagleBuilder::new()
        .handshake_timeout(Duration::from_millis(30))
        .build_with(adapter)
        .unwrap();

    let start = Instant::now();
    assert!(matches!(eagle.confirm_port(), Err(DriverError::Timeout)));
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(!eagle.is_port_confirmed());
}

#[test]
fn test_polarity_echo() {
    let (adapter, _handle, _asleep) = firmware(&[0, 1]);
    let eagle = EagleBuilder::new()
        .sleep_on_drop(false)
        .build_with(adapter)
        .unwrap();

    eagle
        .send_reliable(EagleCommand::Polarity {
            id: 1,
            polarity: Polarity::Negative,
        })
        .unwrap();
    assert!(wait_until(|| eagle.actuator(1).map(|a| a.polarity) == Some(1)));
    assert_eq!(eagle.available_actuators(), vec![1]);
}
