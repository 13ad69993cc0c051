pub mod face;
pub mod measure_time;
pub mod size;
pub mod vector_map;
