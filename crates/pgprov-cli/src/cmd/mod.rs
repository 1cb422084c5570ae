pub mod doctor;
pub mod generate;
pub mod serve;
pub mod status;
pub mod step;
