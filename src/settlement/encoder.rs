use super::ResolvedOptions;
use crate::errors::{Result, SwapError};
use crate::models::TradeDirection;
use crate::route::{Route, TradeLeg, UnifiedTrade};
use ethers::{
    abi::{Token, encode},
    types::{Address, Bytes, U256},
    utils::id,
};

const EXACT_INPUT_SINGLE: &str =
    "exactInputSingle((address,address,uint24,address,uint256,uint256,uint160))";
const EXACT_OUTPUT_SINGLE: &str =
    "exactOutputSingle((address,address,uint24,address,uint256,uint256,uint160))";
const EXACT_INPUT: &str = "exactInput((bytes,address,uint256,uint256))";
const EXACT_OUTPUT: &str = "exactOutput((bytes,address,uint256,uint256))";
const REFUND_ETH: &str = "refundETH()";
const MULTICALL_WITH_DEADLINE: &str = "multicall(uint256,bytes[])";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSettlement {
    pub calldata: Bytes,
    pub value: U256,
}

/// Encodes a trade into the calldata of a router contract.
pub trait SettlementEncoder: Send + Sync {
    /// Contract that receives the settlement call.
    fn target(&self) -> Address;

    fn encode(&self, trade: &UnifiedTrade, options: &ResolvedOptions) -> Result<EncodedSettlement>;
}

/// Uniswap SwapRouter02 calldata.
#[derive(Debug, Clone, Copy)]
pub struct SwapRouter02Encoder {
    router: Address,
}

impl SwapRouter02Encoder {
    pub fn new(router: Address) -> Self {
        Self { router }
    }
}

impl SettlementEncoder for SwapRouter02Encoder {
    fn target(&self) -> Address {
        self.router
    }

    fn encode(&self, trade: &UnifiedTrade, options: &ResolvedOptions) -> Result<EncodedSettlement> {
        let slippage = options.slippage_tolerance;
        let mut calls = Vec::with_capacity(trade.leg_count() + 1);
        let mut value = U256::zero();
        let mut native_input = false;

        for leg in trade.legs() {
            let l = leg.leg();
            let route = &l.route;
            native_input |= route.native_input();

            let (amount, limit) = match l.direction {
                TradeDirection::ExactInput => {
                    (l.input_amount, slippage.min_amount_out(l.output_amount))
                }
                TradeDirection::ExactOutput => {
                    (l.output_amount, slippage.max_amount_in(l.input_amount))
                }
            };
            if route.native_input() {
                let paid = match l.direction {
                    TradeDirection::ExactInput => amount,
                    TradeDirection::ExactOutput => limit,
                };
                value = value.saturating_add(paid);
            }

            let call = match (&leg, l.direction) {
                (TradeLeg::Direct(_), direction) => {
                    let signature = match direction {
                        TradeDirection::ExactInput => EXACT_INPUT_SINGLE,
                        TradeDirection::ExactOutput => EXACT_OUTPUT_SINGLE,
                    };
                    let pool = &route.pools()[0];
                    encode_call(
                        signature,
                        &[Token::Tuple(vec![
                            Token::Address(route.input().address),
                            Token::Address(route.output().address),
                            Token::Uint(U256::from(pool.fee.pips())),
                            Token::Address(options.recipient),
                            Token::Uint(amount),
                            Token::Uint(limit),
                            Token::Uint(U256::zero()),
                        ])],
                    )
                }
                (TradeLeg::Mixed(_), TradeDirection::ExactOutput) => {
                    return Err(SwapError::UnsupportedTradeShape(
                        "mixed routes only support exact input".into(),
                    ));
                }
                (TradeLeg::MultiHop(_) | TradeLeg::Mixed(_), direction) => {
                    let (signature, reverse) = match direction {
                        TradeDirection::ExactInput => (EXACT_INPUT, false),
                        TradeDirection::ExactOutput => (EXACT_OUTPUT, true),
                    };
                    encode_call(
                        signature,
                        &[Token::Tuple(vec![
                            Token::Bytes(encode_path(route, reverse)),
                            Token::Address(options.recipient),
                            Token::Uint(amount),
                            Token::Uint(limit),
                        ])],
                    )
                }
            };
            calls.push(call);
        }

        // leftover native input from exact-output swaps goes back to the sender
        if native_input && trade.direction() == TradeDirection::ExactOutput {
            calls.push(encode_call(REFUND_ETH, &[]));
        }

        let calldata = if calls.len() == 1 && options.deadline.is_none() {
            calls.remove(0)
        } else {
            encode_call(
                MULTICALL_WITH_DEADLINE,
                &[
                    Token::Uint(options.deadline.unwrap_or(U256::MAX)),
                    Token::Array(calls.into_iter().map(Token::Bytes).collect()),
                ],
            )
        };

        Ok(EncodedSettlement {
            calldata: calldata.into(),
            value,
        })
    }
}

fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    data
}

/// Packed `token (20) | fee (3) | token (20) ...` path. Exact-output paths
/// run from the output token back to the input token.
fn encode_path(route: &Route, reverse: bool) -> Vec<u8> {
    let mut tokens: Vec<Address> = route.path().iter().map(|a| a.address).collect();
    let mut fees: Vec<u32> = route.pools().iter().map(|p| p.fee.pips()).collect();
    if reverse {
        tokens.reverse();
        fees.reverse();
    }
    let mut path = Vec::with_capacity(20 + fees.len() * 23);
    path.extend_from_slice(tokens[0].as_bytes());
    for (fee, token) in fees.iter().zip(&tokens[1..]) {
        path.extend_from_slice(&fee.to_be_bytes()[1..]);
        path.extend_from_slice(token.as_bytes());
    }
    path
}
