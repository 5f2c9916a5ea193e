pub mod channel;
pub mod hours;
pub mod location;
pub mod period;
