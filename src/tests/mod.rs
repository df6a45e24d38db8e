
mod forward_properties;
mod jacobian_differences;
