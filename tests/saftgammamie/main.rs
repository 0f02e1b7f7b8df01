mod critical_point;
mod fit;
mod properties;
mod tp_flash;
mod vle_pure;
