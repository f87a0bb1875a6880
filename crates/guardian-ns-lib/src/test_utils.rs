use std::borrow::Cow;
use std::net::Ipv4Addr;

use proptest::collection::vec;
use proptest::prelude::*;

use crate::{QueryType, Question, ResourceData, ResourceRecord};

prop_compose! {
    pub fn arb_question()(qname in arb_qname(), qtype: u16, qclass: u16) -> Question<'static> {
        Question { qname, query_type: QueryType::from(qtype), qclass }
    }
}

prop_compose! {
    pub fn arb_resource_record()(name in arb_qname(), resource_data in arb_resource_data(), class: u16, ttl: u32) -> ResourceRecord<'static> {
        ResourceRecord { name, class, ttl, resource_data }
    }
}

pub fn arb_resource_data() -> impl Strategy<Value = ResourceData<'static>> {
    prop_oneof![
        vec(any::<u8>(), 0..100).prop_map(|rdata| ResourceData::UNKNOWN {
            // Use the reserved QTYPE to avoid collisions with QTYPEs that we decode
            qtype: 65535,
            rdata: Cow::Owned(rdata),
        }),
        any::<Ipv4Addr>().prop_map(|address| ResourceData::A { address }),
    ]
}

fn arb_qname() -> impl Strategy<Value = Cow<'static, str>> {
    proptest::string::string_regex(r"(([a-z0-9][a-z0-9-]{1,20}\.){1,4}[a-z]{2,10})|")
        .expect("regex should be valid")
        .prop_map(Cow::Owned)
}
