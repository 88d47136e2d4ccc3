//! Convenience macros for KNX addresses and device wiring.

/// Creates a [`GroupAddress`](crate::addressing::GroupAddress) from 3-level notation.
///
/// # Syntax
///
/// ```text
/// ga!(main/middle/sub)
/// ```
///
/// # Examples
///
/// ```
/// use knx_sim::ga;
///
/// let switch_cmd = ga!(1/0/1);
/// assert_eq!(switch_cmd.to_string(), "1/0/1");
/// ```
///
/// # Compile-Time Validation
///
/// ```compile_fail
/// // main group > 31
/// let addr = knx_sim::ga!(32/0/0);
/// ```
///
/// ```compile_fail
/// // middle group > 7
/// let addr = knx_sim::ga!(1/8/0);
/// ```
#[macro_export]
macro_rules! ga {
    ($main:literal / $middle:literal / $sub:literal) => {{
        const _: () = {
            if $main > 31 {
                panic!("Main group must be 0-31");
            }
            if $middle > 7 {
                panic!("Middle group must be 0-7");
            }
            if $sub > 255 {
                panic!("Sub group must be 0-255");
            }
        };
        $crate::addressing::GroupAddress::from_parts($main, $middle, $sub)
    }};
}

/// Creates an [`IndividualAddress`](crate::addressing::IndividualAddress)
/// from its area, line and device components.
///
/// # Examples
///
/// ```
/// use knx_sim::ia;
///
/// let device = ia!(1, 1, 10);
/// assert_eq!(device.to_string(), "1.1.10");
/// ```
///
/// ```compile_fail
/// // area > 15
/// let addr = knx_sim::ia!(16, 0, 1);
/// ```
#[macro_export]
macro_rules! ia {
    ($area:literal, $line:literal, $device:literal) => {{
        const _: () = {
            if $area > 15 {
                panic!("Area must be 0-15");
            }
            if $line > 15 {
                panic!("Line must be 0-15");
            }
            if $device > 255 {
                panic!("Device must be 0-255");
            }
        };
        $crate::addressing::IndividualAddress::from_parts($area, $line, $device)
    }};
}

/// Builds an ordered list of group objects (`name => main/middle/sub`).
///
/// Order matters: devices that look for "the first status object" walk the
/// list in the order written here.
///
/// # Examples
///
/// ```
/// use knx_sim::group_objects;
///
/// let objects = group_objects! {
///     "switch_cmd" => 1/0/1,
///     "switch_status" => 1/0/2,
/// };
/// assert_eq!(objects[1].0, "switch_status");
/// assert_eq!(objects[1].1.to_string(), "1/0/2");
/// ```
#[macro_export]
macro_rules! group_objects {
    ($( $name:literal => $main:literal / $middle:literal / $sub:literal ),* $(,)?) => {{
        let objects: ::std::vec::Vec<(::std::string::String, $crate::addressing::GroupAddress)> =
            ::std::vec![$( (::std::string::String::from($name), $crate::ga!($main / $middle / $sub)) ),*];
        objects
    }};
}

#[cfg(test)]
mod tests {
    use crate::addressing::{GroupAddress, IndividualAddress};

    #[test]
    fn test_ga_macro_basic() {
        assert_eq!(ga!(1 / 2 / 3), GroupAddress::from(0x0A03));
        assert_eq!(ga!(5 / 3 / 100), GroupAddress::from(0x2B64));
        assert_eq!(ga!(31 / 7 / 255), GroupAddress::from(0xFFFF));
    }

    #[test]
    fn test_ia_macro_matches_parser() {
        let parsed: IndividualAddress = "1.0.255".parse().unwrap();
        assert_eq!(ia!(1, 0, 255), parsed);
    }

    #[test]
    fn test_group_objects_keeps_order() {
        let objects = group_objects! {
            "b_status" => 1/0/2,
            "a_cmd" => 1/0/1,
        };
        let names: Vec<&str> = objects.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["b_status", "a_cmd"]);
    }
}
