//! Integration tests for the device connect lifecycle: idempotence, mock
//! substitution, failure aggregation, and tree enumeration.

mod common;

use std::sync::Arc;

use acq_core::device::{walk_rw_signals, ConnectOptions, Device, DeviceCore};
use acq_core::error::AcqError;
use acq_core::signal::{soft_signal_rw, SignalRW};

use common::CountingBackend;

/// A motor with a demand/readback pair and a velocity setting.
struct Motor {
    core: DeviceCore,
    backend: Arc<CountingBackend<f64>>,
    velocity: SignalRW<f64>,
}

impl Motor {
    fn new(name: &str) -> Self {
        let backend = CountingBackend::new(0.0f64);
        let setpoint = SignalRW::from_backend("setpoint", backend.clone());
        let velocity = soft_signal_rw("velocity", 1.0f64);

        let core = DeviceCore::new(name);
        core.attach_signal("setpoint", &setpoint);
        core.attach_signal("velocity", &velocity);
        Self {
            core,
            backend,
            velocity,
        }
    }
}

#[async_trait::async_trait]
impl Device for Motor {
    fn name(&self) -> String {
        self.core.name()
    }

    fn set_name(&self, name: &str) {
        self.core.set_name(name);
    }

    fn children(&self) -> Vec<acq_core::device::DeviceChild> {
        self.core.children()
    }

    async fn connect(&self, options: ConnectOptions) -> acq_core::error::AcqResult<()> {
        self.core.connect_children(options).await
    }
}

#[tokio::test]
async fn connect_twice_performs_the_work_once() {
    let motor = Motor::new("motor");
    motor.connect(ConnectOptions::default()).await.unwrap();
    motor.connect(ConnectOptions::default()).await.unwrap();
    assert_eq!(motor.backend.connect_count(), 1);
}

#[tokio::test]
async fn switching_the_mock_flag_always_reconnects() {
    let motor = Motor::new("motor");
    motor.connect(ConnectOptions::default()).await.unwrap();
    assert_eq!(motor.backend.connect_count(), 1);

    // Mock connect does not touch the real backend, but must not be served
    // from the previous real attempt either.
    motor.connect(ConnectOptions::mock()).await.unwrap();
    motor.velocity.set(2.0).await.unwrap();
    let mock = motor.velocity.mock_backend().unwrap();
    assert_eq!(mock.put_history(), vec![2.0]);

    // And switching back connects the real backend again.
    motor.connect(ConnectOptions::default()).await.unwrap();
    assert_eq!(motor.backend.connect_count(), 2);
}

#[tokio::test]
async fn failures_are_aggregated_across_all_children() {
    let good = CountingBackend::new(0.0f64);
    let bad_a = CountingBackend::failing(0.0f64);
    let bad_b = CountingBackend::failing(0.0f64);

    let core = DeviceCore::new("det");
    core.attach_signal("gain", &SignalRW::from_backend("gain", bad_a.clone()));
    core.attach_signal("offset", &SignalRW::from_backend("offset", good.clone()));
    core.attach_signal("bias", &SignalRW::from_backend("bias", bad_b.clone()));

    let err = core
        .connect_children(ConnectOptions::default())
        .await
        .unwrap_err();
    let AcqError::NotConnected(tree) = err else {
        panic!("expected NotConnected, got {err:?}");
    };

    // Both failing children are named; the succeeding one is not rolled back.
    let paths: Vec<String> = tree.failures().into_iter().map(|(path, _)| path).collect();
    assert_eq!(paths, vec!["bias".to_string(), "gain".to_string()]);
    assert_eq!(good.connect_count(), 1);
}

#[tokio::test]
async fn nested_failures_keep_their_full_path() {
    let inner = DeviceCore::new("");
    let bad = CountingBackend::failing(0.0f64);
    inner.attach_signal("readback", &SignalRW::from_backend("readback", bad));

    struct Wrapper(DeviceCore);
    #[async_trait::async_trait]
    impl Device for Wrapper {
        fn name(&self) -> String {
            self.0.name()
        }
        fn set_name(&self, name: &str) {
            self.0.set_name(name);
        }
        fn children(&self) -> Vec<acq_core::device::DeviceChild> {
            self.0.children()
        }
        async fn connect(&self, options: ConnectOptions) -> acq_core::error::AcqResult<()> {
            self.0.connect_children(options).await
        }
    }

    let outer = DeviceCore::new("table");
    outer.attach_device("motor", Arc::new(Wrapper(inner)));

    let err = outer
        .connect_children(ConnectOptions::default())
        .await
        .unwrap_err();
    let AcqError::NotConnected(tree) = err else {
        panic!("expected NotConnected, got {err:?}");
    };
    let paths: Vec<String> = tree.failures().into_iter().map(|(path, _)| path).collect();
    assert_eq!(paths, vec!["motor.readback".to_string()]);
}

#[tokio::test]
async fn renaming_a_parent_cascades_to_every_signal() {
    let motor = Motor::new("motor");
    assert_eq!(motor.velocity.name(), "motor-velocity");

    let table = DeviceCore::new("table");
    table.attach_device("x", Arc::new(motor));
    let children = table.children();
    assert_eq!(children[0].device.name(), "table-x");
    assert_eq!(children[0].device.children()[1].device.name(), "table-x-velocity");
}

#[tokio::test]
async fn walk_enumerates_writable_signals_by_dotted_path() {
    let motor_x = Motor::new("x");
    let motor_y = Motor::new("y");

    let table = DeviceCore::new("table");
    table.attach_device("x", Arc::new(motor_x));
    table.attach_device("y", Arc::new(motor_y));

    struct Table(DeviceCore);
    #[async_trait::async_trait]
    impl Device for Table {
        fn name(&self) -> String {
            self.0.name()
        }
        fn set_name(&self, name: &str) {
            self.0.set_name(name);
        }
        fn children(&self) -> Vec<acq_core::device::DeviceChild> {
            self.0.children()
        }
        async fn connect(&self, options: ConnectOptions) -> acq_core::error::AcqResult<()> {
            self.0.connect_children(options).await
        }
    }
    let table = Table(table);

    let signals = walk_rw_signals(&table);
    let paths: Vec<&str> = signals.iter().map(|(path, _)| path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["x.setpoint", "x.velocity", "y.setpoint", "y.velocity"]
    );

    // The erased handles support the locate/set primitives a settings layer
    // needs.
    let (_, velocity) = &signals[1];
    velocity.put_json(serde_json::json!(4.0)).await.unwrap();
    let location = velocity.locate_json().await.unwrap();
    assert_eq!(location["setpoint"], serde_json::json!(4.0));
}
