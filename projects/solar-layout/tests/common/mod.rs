pub mod synthetic_roof;
