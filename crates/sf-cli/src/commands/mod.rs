pub mod broker;
pub mod cancel;
pub mod doctor;
pub mod gate;
pub mod resume;
pub mod run;
pub mod status;
