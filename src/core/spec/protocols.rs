//! Video bid response protocol codes (AdCOM list 5.8 / OpenRTB `protocol`)

use crate::spec_list;

spec_list! {
    VAST_1_0 = 1 => "VAST 1.0",
    VAST_2_0 = 2 => "VAST 2.0",
    VAST_3_0 = 3 => "VAST 3.0",
    VAST_1_0_WRAPPER = 4 => "VAST 1.0 Wrapper",
    VAST_2_0_WRAPPER = 5 => "VAST 2.0 Wrapper",
    VAST_3_0_WRAPPER = 6 => "VAST 3.0 Wrapper",
    VAST_4_0 = 7 => "VAST 4.0",
    VAST_4_0_WRAPPER = 8 => "VAST 4.0 Wrapper",
    DAAST_1_0 = 9 => "DAAST 1.0",
    DAAST_1_0_WRAPPER = 10 => "DAAST 1.0 Wrapper",
    VAST_4_1 = 11 => "VAST 4.1",
    VAST_4_1_WRAPPER = 12 => "VAST 4.1 Wrapper",
    VAST_4_2 = 13 => "VAST 4.2",
    VAST_4_2_WRAPPER = 14 => "VAST 4.2 Wrapper",
}
