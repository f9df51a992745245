//! Codec → AppleALC layout ids.

use crate::DeviceId;

const CODECS: &[(u16, u16, &str, &[u8])] = &[
    (0x10EC, 0x0230, "ALC230", &[13, 20]),
    (0x10EC, 0x0233, "ALC233", &[3, 4, 5, 13, 27, 28, 29, 32, 33]),
    (0x10EC, 0x0235, "ALC235", &[3, 11, 12, 14, 15, 16, 28, 33, 35, 36]),
    (0x10EC, 0x0236, "ALC236", &[3, 5, 11, 13, 14, 15, 16, 17, 18, 19, 54, 68, 99]),
    (0x10EC, 0x0255, "ALC255", &[3, 11, 13, 15, 17, 18, 21, 27, 28, 29, 30, 31, 32, 66, 71, 82, 86, 99, 100]),
    (0x10EC, 0x0256, "ALC256", &[5, 11, 13, 14, 20, 21, 56, 57, 66, 67, 68, 69, 70, 76, 77, 88, 95, 97, 99, 100]),
    (0x10EC, 0x0257, "ALC257", &[11, 18, 86, 100, 101]),
    (0x10EC, 0x0269, "ALC269", &[1, 3, 5, 6, 9, 10, 11, 12, 13, 15, 16, 17, 18, 19, 20, 21, 22, 23, 27, 28, 29]),
    (0x10EC, 0x0285, "ALC285", &[11, 21, 31, 52, 61, 66, 71, 88]),
    (0x10EC, 0x0289, "ALC289", &[11, 12, 13, 23, 87, 93, 99]),
    (0x10EC, 0x0295, "ALC295", &[1, 3, 13, 14, 15, 21, 22, 23, 24, 28, 77]),
    (0x10EC, 0x0662, "ALC662", &[5, 7, 11, 12, 13, 15, 16, 17]),
    (0x10EC, 0x0887, "ALC887", &[1, 2, 3, 5, 7, 11, 12, 13, 17, 18, 20, 33, 40, 50, 52, 53, 87, 99]),
    (0x10EC, 0x0888, "ALC888", &[1, 2, 3, 4, 5, 7, 11, 27, 28, 29]),
    (0x10EC, 0x0892, "ALC892", &[1, 2, 3, 4, 5, 7, 12, 15, 16, 17, 18, 20, 22, 23, 28, 31, 32, 90, 92, 97, 98, 99]),
    (0x10EC, 0x0897, "ALC897", &[11, 12, 13, 21, 23, 66, 69, 77, 98]),
    (0x10EC, 0x0900, "ALC1150", &[1, 2, 3, 5, 7, 8, 11, 99]),
    (0x10EC, 0x1168, "ALC1220", &[1, 2, 3, 5, 7, 11, 13, 15, 16, 17, 21, 27, 28, 29, 30, 34, 35, 99, 100]),
    (0x10EC, 0x1220, "ALC1220", &[1, 2, 3, 5, 7, 11, 13, 15, 16, 17, 21, 27, 28, 29, 30, 34, 35, 99, 100]),
    (0x14F1, 0x2008, "CX8200", &[3, 15, 21, 80]),
    (0x14F1, 0x510F, "CX20751", &[3, 21, 28]),
    (0x14F1, 0x50F4, "CX20756", &[3, 13]),
    (0x111D, 0x76E0, "IDT92HD91BXX", &[3, 12, 13, 33, 84]),
    (0x111D, 0x76E7, "IDT92HD90BXX", &[3, 12, 19, 21]),
];

/// AppleALC layout ids known to work for a codec, in preference order.
#[must_use]
pub fn layouts(codec: DeviceId) -> Option<&'static [u8]> {
    CODECS
        .iter()
        .find(|(v, d, _, _)| *v == codec.vendor && *d == codec.device)
        .map(|&(_, _, _, layouts)| layouts)
}

/// Marketing name of a codec.
#[must_use]
pub fn codec_name(codec: DeviceId) -> Option<&'static str> {
    CODECS.iter().find(|(v, d, _, _)| *v == codec.vendor && *d == codec.device).map(|&(_, _, name, _)| name)
}
