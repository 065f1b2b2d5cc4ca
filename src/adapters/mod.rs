//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements          | Connects to                    |
//! |------------------|---------------------|--------------------------------|
//! | `bounded_sensor` | TemperatureSource   | Any blocking source, deadlined |
//! | `clock`          | Clock               | System time / virtual time     |
//! | `console_logger` | log::Log            | stderr                         |
//! | `gpio_relay`     | RelaySink           | embedded-hal output pin        |
//! | `log_sink`       | EventSink           | `log` facade                   |
//! | `profiles`       | ProfileCatalog      | Directory of profile JSON      |
//! | `simulator`      | TemperatureSource   | Lumped thermal model           |
//! |                  | RelaySink           |                                |
//! | `storage`        | StoragePort         | Files / in-memory map          |
//! |                  | ConfigPort          |                                |

pub mod bounded_sensor;
pub mod clock;
pub mod console_logger;
pub mod gpio_relay;
pub mod log_sink;
pub mod profiles;
pub mod simulator;
pub mod storage;
